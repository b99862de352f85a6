//! Pass F: greedy binding-weight head reorder.
//!
//! For each occurrence rule, partners are reordered so that whichever
//! partner's arguments best "line up" with variables already bound (by the
//! active atom, or by partners already placed) is matched first. Weight
//! per argument: 100 for a literal or host variable (always available),
//! 10 for a logical variable already seen, 0 otherwise. Ties keep the
//! earliest remaining position (the greedy scan picks the first maximal
//! weight, `remaining` preserves insertion order).

use std::collections::BTreeSet;

use crate::ast::{ChrProgram, Expression, HeadAtom};
use crate::config::CompilerConfig;

pub fn run(program: &mut ChrProgram, config: &CompilerConfig) {
    if !config.head_reorder {
        return;
    }
    for occ in &mut program.occurrences {
        reorder_partners(occ);
    }
}

fn reorder_partners(occ: &mut crate::ast::OccRule) {
    let mut seen: BTreeSet<String> = occ.active.call.free_logical_variables();
    let mut remaining: Vec<HeadAtom> = std::mem::take(&mut occ.partners);
    let mut ordered = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_weight = i64::MIN;
        for (i, p) in remaining.iter().enumerate() {
            let w = weight(p, &seen);
            if w > best_weight {
                best_weight = w;
                best_idx = i;
            }
        }
        let chosen = remaining.remove(best_idx);
        seen.extend(chosen.call.free_logical_variables());
        ordered.push(chosen);
    }

    occ.partners = ordered;
}

fn weight(p: &HeadAtom, seen: &BTreeSet<String>) -> i64 {
    let mut w = 0i64;
    for arg in &p.call.args {
        if arg.is_literal_or_host_var() {
            w += 100;
        } else if let Expression::LogicalVariable { name, .. } = arg {
            if name != "_" && seen.contains(name) {
                w += 10;
            }
        }
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{atom, lit, program, rule, var};
    use crate::occurrence;

    #[test]
    fn prefers_partner_whose_arguments_are_already_bound() {
        // active a(X); partners b(Y) [unrelated var], c(X) [shares X with active].
        let mut prog = program("t")
            .decl("a", 1)
            .decl("b", 1)
            .decl("c", 1)
            .rule(
                rule()
                    .delete(atom("a").arg(var("X")))
                    .delete(atom("b").arg(var("Y")))
                    .delete(atom("c").arg(var("X")))
                    .success(),
            )
            .build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        run(&mut prog, &config);

        let occ_a = prog.occurrences.iter().find(|o| o.active.call.name == "a").unwrap();
        assert_eq!(occ_a.partners[0].call.name, "c");
        assert_eq!(occ_a.partners[1].call.name, "b");
    }

    #[test]
    fn literal_argument_outweighs_unbound_logical_variable() {
        let mut prog = program("t")
            .decl("a", 1)
            .decl("b", 1)
            .decl("c", 1)
            .rule(
                rule()
                    .delete(atom("a").arg(var("X")))
                    .delete(atom("b").arg(var("Z")))
                    .delete(atom("c").arg(lit("1")))
                    .success(),
            )
            .build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        run(&mut prog, &config);

        let occ_a = prog.occurrences.iter().find(|o| o.active.call.name == "a").unwrap();
        assert_eq!(occ_a.partners[0].call.name, "c");
    }
}
