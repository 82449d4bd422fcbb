//! Narrowing the process list down to the processes worth diagnosing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::process::record::ProcessRecord;

/// How name patterns are compared against process names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Exact,
    #[default]
    Contains,
}

/// Which processes are of interest for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSpec {
    /// Explicit pids; takes priority over name matching.
    Pids(BTreeSet<u32>),
    /// Lower-case name patterns and how to compare them.
    Names { patterns: Vec<String>, mode: MatchMode },
}

impl MatchSpec {
    /// Builds the spec from configuration: a non-empty pid list wins.
    pub fn from_parts(pids: &[u32], names: &[String], mode: MatchMode) -> Self {
        if !pids.is_empty() {
            MatchSpec::Pids(pids.iter().copied().collect())
        } else {
            MatchSpec::Names {
                patterns: names.iter().map(|n| n.trim().to_lowercase()).collect(),
                mode,
            }
        }
    }
}

/// Result of matching: the interesting processes plus requested pids that
/// are not running (only ever non-empty for [`MatchSpec::Pids`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub processes: Vec<ProcessRecord>,
    pub missing_pids: BTreeSet<u32>,
}

/// Filters `all` by `spec`, never returning `self_pid`.
pub fn match_processes(all: &[ProcessRecord], spec: &MatchSpec, self_pid: u32) -> MatchResult {
    match spec {
        MatchSpec::Pids(requested) => {
            let processes = all
                .iter()
                .filter(|p| requested.contains(&p.pid) && p.pid != self_pid)
                .cloned()
                .collect();
            let running: BTreeSet<u32> = all.iter().map(|p| p.pid).collect();
            let missing_pids = requested.difference(&running).copied().collect();
            MatchResult {
                processes,
                missing_pids,
            }
        }
        MatchSpec::Names { patterns, mode } => MatchResult {
            processes: all
                .iter()
                .filter(|p| p.pid != self_pid && name_matches(*mode, p.base_name(), patterns))
                .cloned()
                .collect(),
            missing_pids: BTreeSet::new(),
        },
    }
}

/// Whether `name` (already extension-stripped) matches any pattern.
pub fn name_matches(mode: MatchMode, name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| match mode {
        MatchMode::Exact => name == pattern,
        MatchMode::Contains => name.contains(pattern.as_str()),
    })
}
