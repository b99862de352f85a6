//! Pass J: late storage inference.
//!
//! A `keep`-side active head atom only needs to be stored *before* running
//! its occurrence's body if some later-created constraint could match
//! against it once stored (`observed`). If `observed` is false, storing
//! can be deferred until after the body runs (or dropped, if the body
//! never re-asserts it) — `store_active` is flipped to `false`. `delete`-
//! side actives already have `store_active = false` from pass C and are
//! left untouched: removing a constraint can never be deferred, there is
//! nothing later to match against it.

use crate::ast::ChrProgram;
use crate::dependency_graph::DependencyGraph;

pub fn run(program: &mut ChrProgram, graph: &DependencyGraph) {
    for occ in &mut program.occurrences {
        if occ.active.keep && !graph.observed(&occ.active.call.name) {
            occ.store_active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{atom, program, rule, var};
    use crate::config::CompilerConfig;
    use crate::occurrence;

    #[test]
    fn unobserved_keep_active_defers_storage() {
        let mut prog = program("t")
            .decl("p", 1)
            .decl("q", 1)
            .rule(rule().keep(atom("p").arg(var("X"))).keep(atom("q").arg(var("X"))).success())
            .build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        let graph = DependencyGraph::build(&prog);
        run(&mut prog, &graph);

        let occ_p = prog.occurrences.iter().find(|o| o.active.call.name == "p").unwrap();
        assert!(!occ_p.store_active);
    }

    #[test]
    fn delete_side_active_is_never_flipped() {
        let mut prog = program("t").decl("p", 1).decl("q", 1)
            .rule(rule().delete(atom("p").arg(var("X"))).delete(atom("q").arg(var("X"))).success())
            .build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        let graph = DependencyGraph::build(&prog);
        run(&mut prog, &graph);

        assert!(prog.occurrences.iter().all(|o| !o.store_active));
    }
}
