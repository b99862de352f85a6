//! Pass D: builds the constraint dependency graph and answers `observed`.
//!
//! Two relations are built from the source rules (before occurrence
//! expansion, since both only depend on head/body shape):
//!
//! - `E`: a directed edge from every head-atom constraint name of a rule to
//!   every CHR constraint called in that rule's body, plus a single edge to
//!   the `BUILTIN` sink if the body performs any host-level effect.
//! - `P`: a symmetric relation linking every pair of distinct head atoms
//!   (by position, not by name) in the same rule — including a self-loop
//!   when the same constraint name appears twice in one rule's head.
//!
//! `observed(c)` answers: starting a breadth-first search from `c` over
//! `E` alone, is `BUILTIN` reachable, or is some node on that reachable
//! set (including `c` itself, at zero hops) linked to `c` by `P`? The
//! latter captures "a constraint produced downstream of `c` firing may
//! turn around and match against a freshly stored `c`".

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::ast::ChrProgram;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum EdgeTarget {
    Constraint(String),
    Builtin,
}

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<EdgeTarget>>,
    partners: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn build(program: &ChrProgram) -> Self {
        let mut edges: BTreeMap<String, BTreeSet<EdgeTarget>> = BTreeMap::new();
        let mut partners: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for rule in &program.rules {
            let heads = rule.head_atoms(false);

            let mut chr_calls = Vec::new();
            rule.body.collect_chr_calls(&mut chr_calls);
            let has_builtin = rule.body.has_host_effect();

            for (_, decl) in &heads {
                let entry = edges.entry(decl.call.name.clone()).or_default();
                for call in &chr_calls {
                    entry.insert(EdgeTarget::Constraint(call.name.clone()));
                }
                if has_builtin {
                    entry.insert(EdgeTarget::Builtin);
                }
            }

            for i in 0..heads.len() {
                for j in 0..heads.len() {
                    if i == j {
                        continue;
                    }
                    let a = heads[i].1.call.name.clone();
                    let b = heads[j].1.call.name.clone();
                    partners.entry(a).or_default().insert(b);
                }
            }
        }

        DependencyGraph { edges, partners }
    }

    pub fn observed(&self, name: &str) -> bool {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        visited.insert(name.to_string());
        queue.push_back(name.to_string());
        let mut builtin_reached = false;

        while let Some(n) = queue.pop_front() {
            if let Some(dsts) = self.edges.get(&n) {
                for d in dsts {
                    match d {
                        EdgeTarget::Builtin => builtin_reached = true,
                        EdgeTarget::Constraint(c) => {
                            if visited.insert(c.clone()) {
                                queue.push_back(c.clone());
                            }
                        }
                    }
                }
            }
        }

        if builtin_reached {
            return true;
        }
        visited.iter().any(|n| self.partners.get(n).is_some_and(|p| p.contains(name)))
    }

    pub fn destinations(&self, name: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .edges
            .get(name)
            .into_iter()
            .flatten()
            .map(|d| match d {
                EdgeTarget::Builtin => "BUILTIN".to_string(),
                EdgeTarget::Constraint(c) => c.clone(),
            })
            .collect();
        out.sort();
        out
    }

    pub fn partners_of(&self, name: &str) -> Vec<String> {
        let mut out: Vec<String> = self.partners.get(name).into_iter().flatten().cloned().collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{atom, infix, program, rule, var};
    use crate::ast::Body;
    use crate::position::Position;

    #[test]
    fn body_host_effect_yields_builtin_edge() {
        let prog = program("t")
            .decl("a", 1)
            .rule(
                rule()
                    .delete(atom("a").arg(var("X")))
                    .body(Body::HostExpression {
                        expr: infix(">", var("X"), var("X")),
                        pragmas: Default::default(),
                        position: Position::synthetic(),
                    }),
            )
            .build();
        let graph = DependencyGraph::build(&prog);
        assert!(graph.observed("a"));
        assert_eq!(graph.destinations("a"), vec!["BUILTIN".to_string()]);
    }

    #[test]
    fn self_partner_via_duplicate_head_name_makes_constraint_observed() {
        let prog = program("t")
            .decl("p", 1)
            .rule(rule().delete(atom("p").arg(var("X"))).delete(atom("p").arg(var("Y"))).success())
            .build();
        let graph = DependencyGraph::build(&prog);
        assert!(graph.observed("p"));
        assert_eq!(graph.partners_of("p"), vec!["p".to_string()]);
    }

    #[test]
    fn constraint_with_no_body_effect_and_no_self_partner_is_unobserved() {
        let prog = program("t")
            .decl("p", 1)
            .decl("q", 1)
            .rule(rule().delete(atom("p").arg(var("X"))).delete(atom("q").arg(var("X"))).success())
            .build();
        let graph = DependencyGraph::build(&prog);
        assert!(!graph.observed("p"));
    }
}
