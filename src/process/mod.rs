//! Process discovery: enumeration, matching and classification.
//!
//! This module provides:
//! - `record`: the canonical (pid, name) record
//! - `lister`: OS-specific enumeration via `ps` / `tasklist`
//! - `matcher`: filtering by explicit pids or name patterns
//! - `classifier`: routing matched processes to diagnostic backends

pub mod classifier;
pub mod lister;
pub mod matcher;
pub mod record;

// Re-export commonly used types
pub use classifier::{Category, Classifier};
pub use lister::{current_lister, lister_for, ListError, ProcessLister};
pub use matcher::{match_processes, MatchMode, MatchResult, MatchSpec};
pub use record::ProcessRecord;
