//! CLI command implementations for hang-analyzer.
//!
//! This module provides implementations for the default action and all CLI
//! subcommands:
//! - `analyze`: the hang-analysis pass (no subcommand)
//! - `list`: dry-run process matching
//! - `config`: configuration file generation
//! - `check_tools`: external tool resolution

pub mod analyze;
pub mod check_tools;
pub mod config;
pub mod list;

// Re-export command functions
pub use analyze::command_analyze;
pub use check_tools::command_check_tools;
pub use config::command_config;
pub use list::command_list;
