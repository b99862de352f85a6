//! Compiler-wide configuration, layered the same way the teacher's
//! `Config` is (`config.rs`): an optional `chrc.toml` file merged with
//! `CHRC_*` environment overrides via `figment`.

use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_version() -> (u32, u32) {
    (1, 0)
}

/// Every flag that gates a pass or a diagnostic, plus the handful of
/// external-interface values spec.md §6 calls out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Emit `tracing` spans/events at `trace` level for each pass.
    #[serde(default = "default_true")]
    pub trace: bool,
    /// Gate for the pass-I "unused rule" diagnostic.
    #[serde(default = "default_true")]
    pub warning_unused_rule: bool,
    /// Gate for pass I (never-stored inference).
    #[serde(default = "default_true")]
    pub never_stored: bool,
    /// Gate for pass F (head reorder).
    #[serde(default = "default_true")]
    pub head_reorder: bool,
    /// Gate for pass G (guard reorder/hoist).
    #[serde(default = "default_true")]
    pub guard_reorder: bool,
    /// When set, occurrence expansion (pass C) visits delete-side head
    /// atoms before keep-side ones.
    #[serde(default)]
    pub occurrences_reorder: bool,
    /// Gate for pass H (index synthesis).
    #[serde(default = "default_true")]
    pub constraint_store_index: bool,
    /// Whether diagnostics should carry a single collapsed `in_line`
    /// position instead of the full position list.
    #[serde(default)]
    pub line_error: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_version")]
    pub version: (u32, u32),
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            trace: true,
            warning_unused_rule: true,
            never_stored: true,
            head_reorder: true,
            guard_reorder: true,
            occurrences_reorder: false,
            constraint_store_index: true,
            line_error: false,
            output_dir: default_output_dir(),
            version: default_version(),
        }
    }
}

impl CompilerConfig {
    /// Loads the default configuration, then merges `chrc.toml` (if
    /// present) and `CHRC_*` environment variables on top, mirroring the
    /// teacher's `Config::load` layering.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(CompilerConfig::default()))
            .merge(Toml::file("chrc.toml"))
            .merge(Env::prefixed("CHRC_"))
            .extract()
    }
}
