//! Passes E through J, one module per pass, run in the order mandated by
//! the pipeline (`crate::pipeline::compile`): F before G before H before I
//! before J. E (auto-persistent inference) is independent of the others
//! and runs before occurrence expansion.

pub mod auto_persistent;
pub mod guard_reorder;
pub mod head_reorder;
pub mod index_synthesis;
pub mod late_storage;
pub mod never_stored;
