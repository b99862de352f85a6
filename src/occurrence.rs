//! Pass C: expands each source `Rule` into one `OccRule` per active head
//! atom not carrying the `passive` pragma.

use crate::ast::{split_conjunction, ChrProgram, HeadAtom, HeadAtomDecl, OccRule, Pragma, Rule};
use crate::config::CompilerConfig;

/// Replaces `program.occurrences` with the occurrence-rule expansion of
/// `program.rules`, sorted by `(active constraint name, occurrence_index)`.
pub fn expand(program: &mut ChrProgram, config: &CompilerConfig) {
    let mut next_index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut occurrences = Vec::new();

    for rule in &program.rules {
        let guard_conjuncts = rule.guard.as_ref().map(split_conjunction).unwrap_or_default();
        let ordered = rule.head_atoms(config.occurrences_reorder);

        for (i, (keep, decl)) in ordered.iter().enumerate() {
            if decl.pragmas.contains(Pragma::Passive) {
                continue;
            }
            let occurrence_index = {
                let counter = next_index.entry(decl.call.name.clone()).or_insert(0);
                let idx = *counter;
                *counter += 1;
                idx
            };

            let active = HeadAtom { keep: *keep, use_index: -1, call: decl.call.clone() };
            let partners: Vec<HeadAtom> = ordered
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, (k, d))| HeadAtom { keep: *k, use_index: -1, call: d.call.clone() })
                .collect();

            let n = partners.len();
            let mut guard_parts = vec![Vec::new(); n + 1];
            guard_parts[n] = guard_conjuncts.clone();

            occurrences.push(OccRule {
                rule_ref: rule.id,
                occurrence_index,
                active,
                partners,
                guard_parts,
                store_active: *keep,
            });
        }
    }

    occurrences.sort_by(|a, b| (a.active.call.name.clone(), a.occurrence_index).cmp(&(b.active.call.name.clone(), b.occurrence_index)));
    program.occurrences = occurrences;
}

/// Re-derives the ordered `(keep, &HeadAtomDecl)` list for a rule the same
/// way [`expand`] does, for passes that need to recompute partner
/// relationships without re-running the whole expansion (e.g. the
/// dependency graph builder).
pub fn ordered_head_refs(rule: &Rule, del_first: bool) -> Vec<(bool, &HeadAtomDecl)> {
    rule.head_atoms(del_first)
}
