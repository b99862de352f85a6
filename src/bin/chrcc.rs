//! Smoke-test harness for the `chrc` pipeline.
//!
//! There is no in-scope lexer to read real CHR source from disk, so this
//! binary builds one representative in-memory `ChrProgram` with
//! `chrc::ast::builders`, runs it through `chrc::pipeline::compile`, and
//! prints the resulting abstract code and dependency-graph dump to
//! stdout. It is not the out-of-scope driver: no file discovery, no
//! include processing, no multi-file diagnostics aggregation.

use chrc::ast::builders::{atom, infix, program, rule, var};
use chrc::config::CompilerConfig;

fn sample_program() -> chrc::ChrProgram {
    // leq(X, Y), leq(Y, X) <=> X = Y.
    // leq(X, Y) \ leq(X, Y) <=> true.
    program("antisymmetry")
        .decl("leq", 2)
        .rule(
            rule()
                .named("antisymmetry")
                .delete(atom("leq").arg(var("X")).arg(var("Y")))
                .delete(atom("leq").arg(var("Y")).arg(var("X")))
                .body(chrc::ast::Body::Unification {
                    logical_var: var("X"),
                    expr: var("Y"),
                    pragmas: Default::default(),
                    position: chrc::position::Position::synthetic(),
                }),
        )
        .rule(
            rule()
                .named("idempotence")
                .keep(atom("leq").arg(var("X")).arg(var("Y")))
                .delete(atom("leq").arg(var("X")).arg(var("Y")))
                .guard(infix("==", var("X"), var("X")))
                .success(),
        )
        .build()
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let program = sample_program();
    let config = CompilerConfig::default();

    match chrc::compile(program, &config) {
        Ok(output) => {
            println!("=== declarations ===");
            print!("{}", output.codegen.decls);
            println!("=== rules ===");
            print!("{}", output.codegen.rules);
            println!("=== dependency graph ===");
            print!("{}", output.dependency_graph_dump);
            for d in &output.diagnostics {
                eprintln!("warning: {} ({})", d.message, d.position);
            }
        }
        Err(err) => {
            eprintln!("compile error: {err}");
            std::process::exit(1);
        }
    }
}
