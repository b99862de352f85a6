//! Direct pattern-matching replacements for the source language's
//! `accept(visitor)` double dispatch: `walk`/`check` free functions plus
//! `Display`/`pretty` for printing, grounded in the teacher's
//! `Predicate::collect_columns`/`IRNode::pretty_print` (`ir/mod.rs`).

use crate::ast::Expression;

/// Pre-order traversal of `expr`, calling `f` on every node reachable from
/// it (including `expr` itself). Returning `false` from `f` prunes that
/// node's children.
pub fn walk<'a>(expr: &'a Expression, f: &mut impl FnMut(&'a Expression) -> bool) {
    walk_inner(expr, f, false);
}

/// Like [`walk`], but the "light" variant used by guard/index analyses:
/// does not recurse into a `ChrCount`'s inner constraint, since that
/// constraint is a store-membership test rather than a live term.
pub fn walk_light<'a>(expr: &'a Expression, f: &mut impl FnMut(&'a Expression) -> bool) {
    walk_inner(expr, f, true);
}

fn walk_inner<'a>(expr: &'a Expression, f: &mut impl FnMut(&'a Expression) -> bool, light: bool) {
    if !f(expr) {
        return;
    }
    match expr {
        Expression::Identifier { .. }
        | Expression::LogicalVariable { .. }
        | Expression::LocalVariable { .. }
        | Expression::Literal { .. } => {}
        Expression::Prefix { operand, .. } | Expression::Postfix { operand, .. } => {
            walk_inner(operand, f, light);
        }
        Expression::Infix { left, right, .. } => {
            walk_inner(left, f, light);
            walk_inner(right, f, light);
        }
        Expression::Ternary { a, b, c, .. } => {
            walk_inner(a, f, light);
            walk_inner(b, f, light);
            walk_inner(c, f, light);
        }
        Expression::BuiltinCall { args, .. } => {
            for a in args {
                walk_inner(a, f, light);
            }
        }
        Expression::ChrConstraint(call) => {
            for a in &call.args {
                walk_inner(a, f, light);
            }
        }
        Expression::ChrCount { constraint, .. } => {
            if !light {
                walk_inner(constraint, f, light);
            }
        }
    }
}

/// Short-circuiting search: returns the first node (pre-order) for which
/// `pred` holds, or `None`.
pub fn check<'a>(expr: &'a Expression, pred: &mut impl FnMut(&Expression) -> bool) -> Option<&'a Expression> {
    check_inner(expr, pred, false)
}

/// Light variant of [`check`]; see [`walk_light`].
pub fn check_light<'a>(expr: &'a Expression, pred: &mut impl FnMut(&Expression) -> bool) -> Option<&'a Expression> {
    check_inner(expr, pred, true)
}

fn check_inner<'a>(expr: &'a Expression, pred: &mut impl FnMut(&Expression) -> bool, light: bool) -> Option<&'a Expression> {
    let mut found = None;
    walk_inner(expr, &mut |e| {
        if found.is_some() {
            return false;
        }
        if pred(e) {
            found = Some(e);
            false
        } else {
            true
        }
    }, light);
    found
}
