//! Line-oriented, tab-indented scaffold text for declarations and
//! occurrence rules. See `crate::codegen` for the overall shape.

use crate::ast::{Body, ChrProgram, OccRule, SequenceOp};

use super::CodegenOutput;

/// Accumulates tab-indented lines, grounded in the teacher's
/// `IRNode::pretty_print(indent)` recursive-string-building style but
/// collected into a single mutable buffer rather than returned per call.
struct ScaffoldBuilder {
    out: String,
    indent: usize,
}

impl ScaffoldBuilder {
    fn new() -> Self {
        ScaffoldBuilder { out: String::new(), indent: 0 }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn enter(&mut self) {
        self.indent += 1;
    }

    fn exit(&mut self) {
        self.indent -= 1;
    }

    fn finish(self) -> String {
        self.out
    }
}

pub fn emit(program: &ChrProgram) -> CodegenOutput {
    CodegenOutput { decls: emit_decls(program), rules: emit_rules(program) }
}

fn emit_decls(program: &ChrProgram) -> String {
    let mut b = ScaffoldBuilder::new();
    for decl in &program.decls {
        if decl.never_stored {
            b.line(format!("store {}/{} never-stored", decl.name, decl.arity));
            continue;
        }
        let pragma_text = decl.pragmas.to_string();
        let indexes: Vec<String> = decl.indexes.iter().map(|k| format!("{k:?}")).collect();
        if pragma_text.is_empty() {
            b.line(format!("store {}/{} indexes=[{}]", decl.name, decl.arity, indexes.join(", ")));
        } else {
            b.line(format!("store {}/{} indexes=[{}] {}", decl.name, decl.arity, indexes.join(", "), pragma_text));
        }
    }
    b.finish()
}

fn emit_rules(program: &ChrProgram) -> String {
    let mut b = ScaffoldBuilder::new();

    for decl in &program.decls {
        let occs: Vec<&OccRule> = program.occurrences.iter().filter(|o| o.active.call.name == decl.name).collect();

        for (pos, occ) in occs.iter().enumerate() {
            let next_label = match occs.get(pos + 1) {
                Some(next) => format!("{}_{}", decl.name, next.occurrence_index),
                None => format!("{}_store", decl.name),
            };
            let body = &program.rule(occ.rule_ref).body;
            emit_occurrence(&mut b, occ, body, &next_label);
        }

        b.line(format!("{}_store:", decl.name));
        b.enter();
        if decl.never_stored {
            b.line("no-op");
        } else {
            b.line("store");
        }
        b.exit();
    }

    b.finish()
}

fn emit_occurrence(b: &mut ScaffoldBuilder, occ: &OccRule, body: &Body, next_label: &str) {
    b.line(format!("{}_{}:", occ.active.call.name, occ.occurrence_index));
    b.enter();

    for g in &occ.guard_parts[0] {
        b.line(format!("guard {g}"));
    }

    for (i, partner) in occ.partners.iter().enumerate() {
        let index_text = if partner.use_index < 0 { "*".to_string() } else { partner.use_index.to_string() };
        b.line(format!("partner {} index={}", partner.call, index_text));
        b.enter();
        for g in &occ.guard_parts[i + 1] {
            b.line(format!("guard {g}"));
        }
        b.exit();
    }

    for g in occ.guard_parts.last().into_iter().flatten() {
        b.line(format!("guard {g}"));
    }

    if occ.active.keep {
        if occ.store_active {
            b.line("store-before-body");
        } else {
            b.line("defer-store");
        }
    } else {
        b.line("remove");
    }

    b.line("body");
    b.enter();
    emit_body(b, body);
    b.exit();

    b.line(format!("next {next_label}"));
    b.exit();
}

fn emit_body(b: &mut ScaffoldBuilder, body: &Body) {
    match body {
        Body::Keyword { keyword, .. } => b.line(format!("keyword {}", keyword.as_str())),
        Body::HostExpression { expr, pragmas, .. } => b.line(format!("eval {expr} {pragmas}").trim_end()),
        Body::LocalDecl { var, expr, pragmas, .. } => b.line(format!("let {var} = {expr} {pragmas}").trim_end()),
        Body::Unification { logical_var, expr, pragmas, .. } => {
            b.line(format!("unify {logical_var} = {expr} {pragmas}").trim_end());
        }
        Body::ChrConstraintCall { atom, pragmas, .. } => b.line(format!("call {atom} {pragmas}").trim_end()),
        Body::Sequence { op, children, .. } => {
            let header = match op {
                SequenceOp::Conjunction => "seq ,",
                SequenceOp::Disjunction => "seq ;",
            };
            b.line(header);
            b.enter();
            for c in children {
                emit_body(b, c);
            }
            b.exit();
        }
        Body::Try { backtrack_flag, var, body, .. } => {
            b.line(format!("try backtrack={backtrack_flag} var={}", var.as_deref().unwrap_or("_")));
            b.enter();
            emit_body(b, body);
            b.exit();
        }
        Body::Behavior { stop_cond, final_status, on_ok_alt, on_fail_alt, on_ok_final, on_fail_final, body, .. } => {
            b.line("behavior");
            b.enter();
            if let Some(sc) = stop_cond {
                b.line(format!("stop_cond {sc}"));
            }
            if let Some(fs) = final_status {
                b.line(format!("final_status {fs}"));
            }
            emit_body(b, body);
            for (label, alt) in [("on_ok_alt", on_ok_alt), ("on_fail_alt", on_fail_alt), ("on_ok_final", on_ok_final), ("on_fail_final", on_fail_final)] {
                if let Some(alt) = alt {
                    b.line(label);
                    b.enter();
                    emit_body(b, alt);
                    b.exit();
                }
            }
            b.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{atom, program, rule, var};
    use crate::config::CompilerConfig;
    use crate::{dependency_graph::DependencyGraph, occurrence, passes};

    #[test]
    fn declarations_list_stores_with_indexes_and_pragmas() {
        let mut prog = program("t").decl("p", 1).auto_persistent().rule(rule().delete(atom("p").arg(var("X"))).success()).build();
        passes::auto_persistent::run(&mut prog);
        let text = emit_decls(&prog);
        assert!(text.contains("store p/1"));
        assert!(text.contains("# persistent"));
    }

    #[test]
    fn rule_scaffold_contains_partner_and_next_label() {
        let mut prog = program("t")
            .decl("p", 1)
            .decl("q", 1)
            .rule(rule().delete(atom("p").arg(var("X"))).delete(atom("q").arg(var("X"))).success())
            .build();
        let config = CompilerConfig::default();
        occurrence::expand(&mut prog, &config);
        let graph = DependencyGraph::build(&prog);
        passes::head_reorder::run(&mut prog, &config);
        passes::guard_reorder::run(&mut prog, &config);
        passes::index_synthesis::run(&mut prog, &config);
        passes::never_stored::run(&mut prog, &config);
        passes::late_storage::run(&mut prog, &graph);

        let text = emit_rules(&prog);
        assert!(text.contains("p_0:"));
        assert!(text.contains("partner q("));
        assert!(text.contains("p_store:"));
    }
}
