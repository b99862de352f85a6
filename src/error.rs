//! Error and diagnostic carriers, grounded in the teacher's
//! `StorageError` (`src/storage/error.rs`): one `#[error(...)]` variant per
//! rejection class, each carrying the `Position` a driver would need to
//! print a `path:line:column:` prefix.

use thiserror::Error;

use crate::position::Position;

/// Carried at the parser/driver boundary; this crate never produces one,
/// but accepts it as a variant of `CompileError` so a driver can plumb a
/// parse failure through the same `Result` type the rest of the pipeline
/// uses.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub positions: Vec<Position>,
    pub in_line: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("duplicate declaration `{0}` at {1}")]
    DuplicateDeclaration(String, Position),

    #[error("duplicate rule name `{0}` at {1}")]
    DuplicateRuleName(String, Position),

    #[error("invalid guard at {1}: {0}")]
    InvalidGuard(String, Position),

    #[error("constraint `{name}` called with {found} argument(s) at {position}, expected {expected}")]
    BodyAtomArityMismatch { name: String, expected: usize, found: usize, position: Position },

    #[error("undeclared constraint `{0}` at {1}")]
    UndeclaredConstraint(String, Position),

    #[error("internal compiler error at {1}: {0}")]
    Internal(String, Position),
}

/// Severity of a non-fatal [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
}

/// A non-fatal finding collected alongside a successful compile, e.g. the
/// pass-I "unused rule" warning. Formatting a `path:line:column:` prefix is
/// left to the driver; this crate only attaches the position.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub position: Position,
}

impl Diagnostic {
    pub fn unused_rule(message: impl Into<String>, position: Position) -> Self {
        Diagnostic { severity: Severity::Warning, message: message.into(), position }
    }
}
