//! Dependency-graph dump, in the `NAME [ { partners } ] --> dsts` format
//! with partners and destinations lexicographically sorted.

use crate::ast::ChrProgram;
use crate::dependency_graph::DependencyGraph;

pub fn dump_dependency_graph(program: &ChrProgram, graph: &DependencyGraph) -> String {
    let mut out = String::new();
    for decl in &program.decls {
        let partners = graph.partners_of(&decl.name);
        let destinations = graph.destinations(&decl.name);
        out.push_str(&format!("{} [ {{ {} }} ] --> {}\n", decl.name, partners.join(", "), destinations.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{atom, program, rule, var};
    use crate::ast::Body;
    use crate::position::Position;

    #[test]
    fn dump_matches_documented_format() {
        let prog = program("t")
            .decl("a", 1)
            .decl("b", 1)
            .decl("c", 1)
            .rule(
                rule()
                    .delete(atom("a").arg(var("X")))
                    .delete(atom("b").arg(var("X")))
                    .body(Body::ChrConstraintCall {
                        atom: atom("c").arg(var("X")).build_call(),
                        pragmas: Default::default(),
                        position: Position::synthetic(),
                    }),
            )
            .build();
        let graph = DependencyGraph::build(&prog);
        let text = dump_dependency_graph(&prog, &graph);
        assert!(text.contains("a [ { b } ] --> c"));
    }

    #[test]
    fn unreferenced_decl_has_no_partners_or_destinations() {
        let prog = program("t").decl("z", 0).build();
        let graph = DependencyGraph::build(&prog);
        let text = dump_dependency_graph(&prog, &graph);
        assert!(text.contains("z [ {  } ] --> \n"));
    }
}
