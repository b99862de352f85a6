//! Property-based tests over small randomly generated CHR programs,
//! grounded in the teacher's `tests/property_arithmetic.rs` use of
//! `proptest` over randomly generated Datalog inputs.

use proptest::prelude::*;

use chrc::ast::builders::{atom, program, rule, var};
use chrc::config::CompilerConfig;

/// Builds a random simplification rule over two fresh single-argument
/// constraints sharing one logical variable, with `name_a`/`name_b` drawn
/// from a bounded alphabet so proptest can shrink failures.
fn arb_two_constraint_program() -> impl Strategy<Value = chrc::ChrProgram> {
    ("[a-c]", "[d-f]").prop_filter_map("names must differ", |(a, b)| {
        if a == b {
            return None;
        }
        Some(
            program("prop")
                .decl(&a, 1)
                .decl(&b, 1)
                .rule(rule().delete(atom(&a).arg(var("X"))).delete(atom(&b).arg(var("X"))).success())
                .build(),
        )
    })
}

proptest! {
    /// Every occurrence rule's partner count equals the number of other
    /// head atoms in its source rule (the partner relation is total minus
    /// self).
    #[test]
    fn every_occurrence_has_exactly_one_partner(prog in arb_two_constraint_program()) {
        let config = CompilerConfig::default();
        let output = chrc::compile(prog, &config).unwrap();
        for occ in &output.program.occurrences {
            prop_assert_eq!(occ.partners.len(), 1);
        }
    }

    /// A delete-side active head atom's `store_active` is always false,
    /// regardless of what the optimizer passes do.
    #[test]
    fn delete_side_actives_never_store(prog in arb_two_constraint_program()) {
        let config = CompilerConfig::default();
        let output = chrc::compile(prog, &config).unwrap();
        for occ in &output.program.occurrences {
            if !occ.active.keep {
                prop_assert!(!occ.store_active);
            }
        }
    }

    /// Every guard conjunct ends up in exactly one bucket: the per-occurrence
    /// guard-bucket split never drops or duplicates a conjunct.
    #[test]
    fn guard_bucket_split_is_a_partition(prog in arb_two_constraint_program()) {
        let config = CompilerConfig::default();
        let output = chrc::compile(prog, &config).unwrap();
        for occ in &output.program.occurrences {
            prop_assert_eq!(occ.guard_parts.len(), occ.partners.len() + 1);
        }
    }
}
