//! Pass E: auto-persistent inference.
//!
//! If `program.auto_persistent` is set and no rule body anywhere uses a
//! disjunction, `try`, or `behavior` construct, every declared constraint's
//! store is tagged with the `persistent` pragma — backtracking would make
//! "never remove from the store" unsound, so any occurrence of those
//! constructs vetoes the whole program.

use crate::ast::{ChrProgram, Pragma};

pub fn run(program: &mut ChrProgram) {
    if !program.auto_persistent {
        return;
    }
    let vetoed = program.rules.iter().any(|r| r.body.contains_backtracking_construct());
    if vetoed {
        return;
    }
    for decl in &mut program.decls {
        decl.pragmas.insert(Pragma::Persistent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{atom, program, rule, var};
    use crate::ast::{Body, SequenceOp};
    use crate::position::Position;

    #[test]
    fn tags_every_store_persistent_when_enabled_and_no_backtracking() {
        let mut prog = program("t").decl("p", 1).auto_persistent().rule(rule().delete(atom("p").arg(var("X"))).success()).build();
        run(&mut prog);
        assert!(prog.decls[0].pragmas.contains(Pragma::Persistent));
    }

    #[test]
    fn does_nothing_when_disabled() {
        let mut prog = program("t").decl("p", 1).rule(rule().delete(atom("p").arg(var("X"))).success()).build();
        run(&mut prog);
        assert!(!prog.decls[0].pragmas.contains(Pragma::Persistent));
    }

    #[test]
    fn vetoed_by_disjunction_anywhere_in_a_body() {
        let mut prog = program("t")
            .decl("p", 1)
            .auto_persistent()
            .rule(
                rule().delete(atom("p").arg(var("X"))).body(Body::Sequence {
                    op: SequenceOp::Disjunction,
                    children: vec![
                        Body::Keyword { keyword: crate::ast::Keyword::Success, position: Position::synthetic() },
                        Body::Keyword { keyword: crate::ast::Keyword::Failure, position: Position::synthetic() },
                    ],
                    position: Position::synthetic(),
                }),
            )
            .build();
        run(&mut prog);
        assert!(!prog.decls[0].pragmas.contains(Pragma::Persistent));
    }
}
