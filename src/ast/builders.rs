//! Fluent builders for constructing CHR programs in tests and in
//! `src/bin/chrcc.rs`, grounded in the teacher's `AtomBuilder`/`RuleBuilder`
//! (`ast/builders.rs`).

use crate::position::Position;

use super::{
    Body, ChrConstraintCall, ChrConstraintDecl, ChrProgram, DeclId, HeadAtomDecl, Keyword, Pragma, PragmaSet, Rule,
    RuleId, RuleKind, SequenceOp,
};
use super::Expression;

pub fn var(name: &str) -> Expression {
    Expression::LogicalVariable { name: name.to_string(), position: Position::synthetic() }
}

pub fn local(name: &str) -> Expression {
    Expression::LocalVariable { name: name.to_string(), position: Position::synthetic() }
}

pub fn ident(name: &str) -> Expression {
    Expression::Identifier { name: name.to_string(), position: Position::synthetic() }
}

pub fn lit(text: &str) -> Expression {
    Expression::Literal { text: text.to_string(), position: Position::synthetic() }
}

pub fn infix(op: &str, left: Expression, right: Expression) -> Expression {
    Expression::Infix { op: op.to_string(), left: Box::new(left), right: Box::new(right), position: Position::synthetic() }
}

pub fn assign(local_name: &str, rhs: Expression) -> Expression {
    infix("=", local(local_name), rhs)
}

/// Fluent builder for a single head/body atom, e.g. `atom("p").arg(var("X"))`.
pub struct AtomBuilder {
    name: String,
    args: Vec<Expression>,
    pragmas: PragmaSet,
}

pub fn atom(name: &str) -> AtomBuilder {
    AtomBuilder { name: name.to_string(), args: Vec::new(), pragmas: PragmaSet::new() }
}

impl AtomBuilder {
    pub fn arg(mut self, e: Expression) -> Self {
        self.args.push(e);
        self
    }

    pub fn pragma(mut self, p: Pragma) -> Self {
        self.pragmas.insert(p);
        self
    }

    pub fn build_call(&self) -> ChrConstraintCall {
        ChrConstraintCall::new(self.name.clone(), self.args.clone(), Position::synthetic())
    }

    fn build_head(self) -> HeadAtomDecl {
        HeadAtomDecl { call: self.build_call(), pragmas: self.pragmas }
    }

    pub fn into_body_call(self) -> Body {
        Body::ChrConstraintCall {
            atom: self.build_call(),
            pragmas: self.pragmas,
            position: Position::synthetic(),
        }
    }
}

/// Fluent builder for a rule, e.g.
/// `rule().keep(atom("p").arg(var("X"))).guard(..).body(..)`.
pub struct RuleBuilder {
    name: Option<String>,
    head_keep: Vec<AtomBuilder>,
    head_del: Vec<AtomBuilder>,
    guard: Option<Expression>,
    body: Option<Body>,
    propagation_no_history: bool,
}

pub fn rule() -> RuleBuilder {
    RuleBuilder {
        name: None,
        head_keep: Vec::new(),
        head_del: Vec::new(),
        guard: None,
        body: None,
        propagation_no_history: false,
    }
}

impl RuleBuilder {
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn keep(mut self, a: AtomBuilder) -> Self {
        self.head_keep.push(a);
        self
    }

    pub fn delete(mut self, a: AtomBuilder) -> Self {
        self.head_del.push(a);
        self
    }

    pub fn guard(mut self, g: Expression) -> Self {
        self.guard = Some(g);
        self
    }

    pub fn body(mut self, b: Body) -> Self {
        self.body = Some(b);
        self
    }

    pub fn success(self) -> Self {
        self.body(Body::Keyword { keyword: Keyword::Success, position: Position::synthetic() })
    }

    /// Marks this rule as a propagation-no-history rule (`==>` without
    /// history tracking). Forces `Pragma::NoHistory` onto every keep-side
    /// head atom, mirroring `PropagationNoHistoryRule`'s constructor.
    pub fn propagation_no_history(mut self) -> Self {
        self.propagation_no_history = true;
        self
    }

    pub fn build(self, id: RuleId) -> Rule {
        let has_del = !self.head_del.is_empty();
        let has_keep = !self.head_keep.is_empty();
        let force_no_history = self.propagation_no_history;
        let kind = if force_no_history {
            RuleKind::PropagationNoHistory
        } else if has_del && has_keep {
            RuleKind::Simpagation
        } else if has_del {
            RuleKind::Simplification
        } else {
            RuleKind::Propagation
        };
        let head_keep = self.head_keep.into_iter().map(move |mut a| {
            if force_no_history {
                a.pragmas.insert(Pragma::NoHistory);
            }
            a
        });
        Rule {
            id,
            name: self.name,
            kind,
            head_keep: head_keep.map(AtomBuilder::build_head).collect(),
            head_del: self.head_del.into_iter().map(AtomBuilder::build_head).collect(),
            guard: self.guard,
            body: self.body.unwrap_or(Body::Keyword { keyword: Keyword::Success, position: Position::synthetic() }),
            position: Position::synthetic(),
        }
    }
}

pub fn conjunction(children: Vec<Body>) -> Body {
    Body::Sequence { op: SequenceOp::Conjunction, children, position: Position::synthetic() }
}

/// Fluent builder for whole programs, used across integration tests.
pub struct ProgramBuilder {
    program: ChrProgram,
}

pub fn program(name: &str) -> ProgramBuilder {
    ProgramBuilder { program: ChrProgram::new(name) }
}

impl ProgramBuilder {
    pub fn decl(mut self, name: &str, arity: usize) -> Self {
        let id = DeclId(self.program.decls.len());
        self.program.decls.push(ChrConstraintDecl::new(id, name, arity, Position::synthetic()));
        self
    }

    pub fn auto_persistent(mut self) -> Self {
        self.program.auto_persistent = true;
        self
    }

    pub fn rule(mut self, builder: RuleBuilder) -> Self {
        let id = RuleId(self.program.rules.len());
        self.program.rules.push(builder.build(id));
        self
    }

    pub fn build(mut self) -> ChrProgram {
        self.program.resolve_decl_refs();
        self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagation_no_history_forces_no_history_on_every_keep_head() {
        let r = rule()
            .keep(atom("p").arg(var("X")))
            .keep(atom("q").arg(var("X")))
            .propagation_no_history()
            .build(RuleId(0));
        assert_eq!(r.kind, RuleKind::PropagationNoHistory);
        assert!(r.head_keep.iter().all(|h| h.pragmas.contains(Pragma::NoHistory)));
    }
}
