//! Pass G: guard reorder/hoist.
//!
//! Moves each guard conjunct as early as possible: into `guard_parts[i]`
//! (executable once the first `i` partners are matched) as soon as every
//! logical variable it depends on is bound by the active atom or by a
//! partner already matched, and every host-local variable it depends on
//! has already been assigned by an earlier-hoisted conjunct. Assignment
//! conjuncts (`local = rhs`) are keyed on `rhs`'s free variables only,
//! since the assignment itself introduces `local` rather than consuming
//! it.

use std::collections::BTreeSet;

use crate::ast::{assignment_lhs, guard_conjunct_deps, ChrProgram, OccRule};
use crate::config::CompilerConfig;

pub fn run(program: &mut ChrProgram, config: &CompilerConfig) {
    if !config.guard_reorder {
        return;
    }
    for occ in &mut program.occurrences {
        reorder_guards(occ);
    }
}

fn reorder_guards(occ: &mut OccRule) {
    let n = occ.partners.len();
    // Pull every conjunct already hoisted into any bucket back into one pool
    // before re-splitting, so re-running this pass on an already-processed
    // occurrence is a no-op instead of discarding prior hoists.
    let mut leftover: Vec<_> = occ.guard_parts.iter_mut().flat_map(std::mem::take).collect();

    let active_bound = occ.active.call.free_logical_variables();
    let all_partner_vars: BTreeSet<String> =
        occ.partners.iter().flat_map(|p| p.call.free_logical_variables()).collect();
    let mut not_decl_head: BTreeSet<String> = all_partner_vars.difference(&active_bound).cloned().collect();
    let mut not_decl_local: BTreeSet<String> = leftover.iter().filter_map(assignment_lhs).collect();

    for i in 0..n {
        let mut still_remaining = Vec::new();
        for g in leftover.drain(..) {
            let (lv_deps, local_deps) = guard_conjunct_deps(&g);
            if lv_deps.is_disjoint(&not_decl_head) && local_deps.is_disjoint(&not_decl_local) {
                if let Some(lhs) = assignment_lhs(&g) {
                    not_decl_local.remove(&lhs);
                }
                occ.guard_parts[i].push(g);
            } else {
                still_remaining.push(g);
            }
        }
        leftover = still_remaining;

        let v_p = occ.partners[i].call.free_logical_variables();
        for v in v_p {
            not_decl_head.remove(&v);
        }
    }

    occ.guard_parts[n] = leftover;
}
