//! Pass I: never-stored inference.
//!
//! Scans occurrence rules in order. Tracks, per active constraint name,
//! whether every occurrence seen so far "might never need storing": true
//! at the first occurrence of a name, flipped to false the moment a `keep`
//! occurrence is seen (a kept head atom must be stored so later partners
//! can match it). A `delete`-side occurrence with an empty guard, no
//! partners, and an argument list with no literal, no host variable, and
//! no repeated logical-variable name can run entirely on the freshly
//! asserted constraint's own arguments — if that holds for every
//! occurrence of a name, the declaration is marked `never_stored` and its
//! storing occurrences are dropped. Occurrences that partner against a
//! now-`never_stored` constraint are dropped in a second pass, since that
//! partner can no longer be matched from the store.

use std::collections::HashMap;

use crate::ast::{ChrProgram, DeclId, Expression};
use crate::config::CompilerConfig;
use crate::error::Diagnostic;

pub fn run(program: &mut ChrProgram, config: &CompilerConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if !config.never_stored {
        return diagnostics;
    }

    let mut may_be_never_stored: HashMap<String, bool> = HashMap::new();
    let mut last_active_name: Option<String> = None;
    let mut retained = Vec::with_capacity(program.occurrences.len());

    for occ in program.occurrences.drain(..) {
        let name = occ.active.call.name.clone();
        if last_active_name.as_deref() != Some(name.as_str()) {
            may_be_never_stored.insert(name.clone(), true);
            last_active_name = Some(name.clone());
        }

        let decl_id: DeclId = match occ.active.call.decl_ref {
            Some(id) => id,
            None => {
                retained.push(occ);
                continue;
            }
        };

        if program.decls[decl_id.0].never_stored {
            if config.warning_unused_rule {
                diagnostics.push(Diagnostic::unused_rule(
                    format!("occurrence of `{name}` is unreachable: its declaration is never stored"),
                    occ.active.call.position,
                ));
            }
            continue;
        }

        if occ.active.keep {
            may_be_never_stored.insert(name.clone(), false);
        } else {
            let mbns = *may_be_never_stored.get(&name).unwrap_or(&true);
            if mbns
                && occ.partners.is_empty()
                && occ.guard_is_empty()
                && args_allow_never_stored(&occ.active.call.args)
            {
                program.decls[decl_id.0].never_stored = true;
            }
        }

        retained.push(occ);
    }

    program.occurrences = retained;

    let decls = &program.decls;
    program.occurrences.retain(|occ| {
        let blocked = occ
            .partners
            .iter()
            .any(|p| p.call.decl_ref.is_some_and(|id| decls[id.0].never_stored));
        if blocked && config.warning_unused_rule {
            diagnostics.push(Diagnostic::unused_rule(
                format!(
                    "occurrence of `{}` is unreachable: a partner constraint is never stored",
                    occ.active.call.name
                ),
                occ.active.call.position,
            ));
        }
        !blocked
    });

    diagnostics
}

fn args_allow_never_stored(args: &[Expression]) -> bool {
    let mut seen = std::collections::BTreeSet::new();
    for a in args {
        match a {
            Expression::LogicalVariable { name, .. } => {
                if name != "_" && !seen.insert(name.clone()) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{atom, lit, program, rule, var};
    use crate::occurrence;

    #[test]
    fn guardless_unpartnered_fresh_variables_marks_never_stored() {
        let mut prog = program("t").decl("p", 1).rule(rule().delete(atom("p").arg(var("X"))).success()).build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        run(&mut prog, &config);
        let id = prog.find_decl_by_name("p").unwrap();
        assert!(prog.decl(id).never_stored);
        // The qualifying occurrence itself still runs (it fires immediately at
        // assertion time); only *later* occurrences of a never-stored
        // constraint become unreachable and get dropped.
        assert_eq!(prog.occurrences.len(), 1);
    }

    #[test]
    fn later_occurrence_of_never_stored_constraint_is_dropped() {
        let mut prog = program("t")
            .decl("p", 1)
            .rule(rule().delete(atom("p").arg(var("X"))).success())
            .rule(rule().delete(atom("p").arg(var("Y"))).success())
            .build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        run(&mut prog, &config);
        assert_eq!(prog.occurrences.len(), 1);
    }

    #[test]
    fn literal_argument_blocks_never_stored() {
        let mut prog = program("t").decl("p", 1).rule(rule().delete(atom("p").arg(lit("1"))).success()).build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        run(&mut prog, &config);
        let id = prog.find_decl_by_name("p").unwrap();
        assert!(!prog.decl(id).never_stored);
    }

    #[test]
    fn partner_of_never_stored_constraint_is_dropped() {
        let mut prog = program("t")
            .decl("p", 1)
            .decl("q", 1)
            .rule(rule().delete(atom("p").arg(var("X"))).success())
            .rule(rule().delete(atom("q").arg(var("X"))).delete(atom("p").arg(var("X"))).success())
            .build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        run(&mut prog, &config);
        assert!(prog.occurrences.iter().all(|o| o.active.call.name != "q"));
    }
}
