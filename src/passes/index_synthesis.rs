//! Pass H: index synthesis.
//!
//! For each occurrence rule (in `(active name, occurrence_index)` order,
//! i.e. the order pass C/F leave `program.occurrences` in), walks its
//! partners and records which argument positions are bound by the time
//! that partner is reached (a literal, a host variable, or a logical
//! variable already introduced by the active atom or an earlier partner).
//! That position tuple becomes a candidate index on the partner's
//! declaration, deduplicated per declaration and assigned a stable,
//! creation-order `use_index`.

use std::collections::BTreeSet;

use crate::ast::{ChrProgram, Expression};
use crate::config::CompilerConfig;

pub fn run(program: &mut ChrProgram, config: &CompilerConfig) {
    if !config.constraint_store_index {
        return;
    }
    let ChrProgram { decls, occurrences, .. } = program;

    for occ in occurrences.iter_mut() {
        let mut seen: BTreeSet<String> = occ.active.call.free_logical_variables();

        for partner in occ.partners.iter_mut() {
            let mut key = Vec::new();
            for (pos, arg) in partner.call.args.iter().enumerate() {
                let contributes = match arg {
                    Expression::LogicalVariable { name, .. } => name != "_" && seen.contains(name),
                    other => other.is_literal_or_host_var(),
                };
                if contributes {
                    key.push(pos);
                }
            }

            partner.use_index = if key.is_empty() {
                -1
            } else if let Some(decl_id) = partner.call.decl_ref {
                let decl = &mut decls[decl_id.0];
                match decl.indexes.iter().position(|k| k == &key) {
                    Some(existing) => existing as i32,
                    None => {
                        decl.indexes.push(key);
                        (decl.indexes.len() - 1) as i32
                    }
                }
            } else {
                -1
            };

            seen.extend(partner.call.free_logical_variables());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{atom, program, rule, var};
    use crate::occurrence;

    #[test]
    fn distinct_bound_positions_synthesize_distinct_indexes() {
        let mut prog = program("t")
            .decl("a", 1)
            .decl("b", 2)
            .rule(rule().keep(atom("a").arg(var("X"))).keep(atom("b").arg(var("X")).arg(var("Y"))).success())
            .rule(rule().keep(atom("a").arg(var("X"))).keep(atom("b").arg(var("Y")).arg(var("X"))).success())
            .build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        run(&mut prog, &config);

        let b_decl = prog.find_decl_by_name("b").unwrap();
        assert_eq!(prog.decl(b_decl).indexes, vec![vec![0], vec![1]]);

        let a_occurrences: Vec<_> = prog.occurrences.iter().filter(|o| o.active.call.name == "a").collect();
        assert_eq!(a_occurrences[0].partners[0].use_index, 0);
        assert_eq!(a_occurrences[1].partners[0].use_index, 1);
    }

    #[test]
    fn fully_unbound_partner_gets_no_index() {
        let mut prog = program("t")
            .decl("a", 1)
            .decl("b", 1)
            .rule(rule().delete(atom("a").arg(var("X"))).delete(atom("b").arg(var("Y"))).success())
            .build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        run(&mut prog, &config);

        let occ_a = prog.occurrences.iter().find(|o| o.active.call.name == "a").unwrap();
        assert_eq!(occ_a.partners[0].use_index, -1);
    }
}
