//! The single entry point wiring every pass together in the mandated
//! order: resolve declarations, infer auto-persistence (E), expand
//! occurrence rules (C), build the dependency graph (D), then F → G → H →
//! I → J, finally handing the result to the code emitter (K).

use crate::ast::{split_conjunction, ChrProgram, Expression};
use crate::codegen::{self, CodegenOutput};
use crate::config::CompilerConfig;
use crate::dependency_graph::DependencyGraph;
use crate::error::{CompileError, Diagnostic};
use crate::occurrence;
use crate::passes;
use crate::position::Position;
use crate::visitor;

/// The CHR-specific keywords the grammar reserves (`chrppc`'s `CHR_KEYWORDS`);
/// a guard referencing one of these as a plain identifier is almost always a
/// mistyped call to the construct itself rather than a real host symbol.
const RESERVED_GUARD_KEYWORDS: &[&str] = &[
    "failure",
    "success",
    "stop",
    "chr_constraint",
    "chr_include",
    "chr_count",
    "try",
    "exists_it",
    "exists",
    "forall_it",
    "forall",
    "behavior",
];

const MUTATING_INFIX_OPS: &[&str] = &["+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>="];

/// Everything a driver needs after a successful compile: the transformed
/// program, the two codegen text streams, the dependency-graph dump, and
/// any non-fatal diagnostics collected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    pub program: ChrProgram,
    pub codegen: CodegenOutput,
    pub dependency_graph_dump: String,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn compile(mut program: ChrProgram, config: &CompilerConfig) -> Result<CompileOutput, CompileError> {
    tracing::debug!(program = %program.name, "starting compile");

    let unresolved = program.resolve_decl_refs();
    if let Some(name) = unresolved.into_iter().next() {
        return Err(CompileError::UndeclaredConstraint(name, Position::synthetic()));
    }

    check_duplicate_declarations(&program)?;
    check_duplicate_rule_names(&program)?;
    check_guard_validity(&program)?;
    check_body_atom_arities(&program)?;

    passes::auto_persistent::run(&mut program);
    tracing::trace!("pass E (auto-persistent) complete");

    occurrence::expand(&mut program, config);
    tracing::trace!(occurrences = program.occurrences.len(), "pass C (occurrence expansion) complete");

    let graph = DependencyGraph::build(&program);

    passes::head_reorder::run(&mut program, config);
    tracing::trace!("pass F (head reorder) complete");

    passes::guard_reorder::run(&mut program, config);
    tracing::trace!("pass G (guard reorder) complete");

    passes::index_synthesis::run(&mut program, config);
    tracing::trace!("pass H (index synthesis) complete");

    let mut diagnostics = passes::never_stored::run(&mut program, config);
    tracing::trace!("pass I (never-stored inference) complete");

    passes::late_storage::run(&mut program, &graph);
    tracing::trace!("pass J (late storage inference) complete");

    let codegen_output = codegen::emit(&program);
    let dump = codegen::dump_dependency_graph(&program, &graph);

    diagnostics.sort_by_key(|d| (d.position, d.message.clone()));

    Ok(CompileOutput { program, codegen: codegen_output, dependency_graph_dump: dump, diagnostics })
}

fn check_duplicate_declarations(program: &ChrProgram) -> Result<(), CompileError> {
    let mut seen = std::collections::HashSet::new();
    for decl in &program.decls {
        if !seen.insert(decl.name.clone()) {
            return Err(CompileError::DuplicateDeclaration(decl.name.clone(), decl.position));
        }
    }
    Ok(())
}

fn check_duplicate_rule_names(program: &ChrProgram) -> Result<(), CompileError> {
    let mut seen = std::collections::HashSet::new();
    for rule in &program.rules {
        if let Some(name) = &rule.name {
            if !seen.insert(name.clone()) {
                return Err(CompileError::DuplicateRuleName(name.clone(), rule.position));
            }
        }
    }
    Ok(())
}

fn check_guard_validity(program: &ChrProgram) -> Result<(), CompileError> {
    for rule in &program.rules {
        if let Some(guard) = &rule.guard {
            validate_guard(guard)?;
        }
    }
    Ok(())
}

/// Rejects a guard containing a bare CHR constraint call, a mutating
/// operator, a reserved keyword, or an assignment whose left-hand side is
/// not a host local variable.
fn validate_guard(guard: &Expression) -> Result<(), CompileError> {
    let mut offense: Option<(String, Position)> = None;
    visitor::walk_light(guard, &mut |e| {
        if offense.is_some() {
            return false;
        }
        match e {
            Expression::ChrConstraint(call) => {
                offense = Some((format!("guard may not call CHR constraint `{}`", call.name), call.position));
            }
            Expression::Prefix { op, position, .. } | Expression::Postfix { op, position, .. }
                if op == "++" || op == "--" =>
            {
                offense = Some((format!("guard may not use mutating operator `{op}`"), *position));
            }
            Expression::Infix { op, position, .. } if MUTATING_INFIX_OPS.contains(&op.as_str()) => {
                offense = Some((format!("guard may not use mutating operator `{op}`"), *position));
            }
            Expression::Identifier { name, position } if RESERVED_GUARD_KEYWORDS.contains(&name.as_str()) => {
                offense = Some((format!("guard may not use reserved keyword `{name}`"), *position));
            }
            _ => {}
        }
        true
    });
    if let Some((message, position)) = offense {
        return Err(CompileError::InvalidGuard(message, position));
    }

    for conjunct in split_conjunction(guard) {
        if let Expression::Infix { op, left, position, .. } = &conjunct {
            if op == "=" && !matches!(left.as_ref(), Expression::LocalVariable { .. }) {
                return Err(CompileError::InvalidGuard(
                    "assignment in guard must assign to a host local variable".to_string(),
                    *position,
                ));
            }
        }
    }
    Ok(())
}

fn check_body_atom_arities(program: &ChrProgram) -> Result<(), CompileError> {
    for rule in &program.rules {
        let mut calls = Vec::new();
        rule.body.collect_chr_calls(&mut calls);
        for call in calls {
            if let Some(decl_id) = call.decl_ref {
                let decl = program.decl(decl_id);
                if decl.arity != call.args.len() {
                    return Err(CompileError::BodyAtomArityMismatch {
                        name: call.name.clone(),
                        expected: decl.arity,
                        found: call.args.len(),
                        position: call.position,
                    });
                }
            }
        }
    }
    Ok(())
}
