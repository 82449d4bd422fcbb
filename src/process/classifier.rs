//! Process classification for routing processes to diagnostic backends.
//!
//! A matched process lands in exactly one [`Category`], decided by name prefix
//! in fixed priority order: self-reporting runtime first, then JVM, otherwise
//! native. Native processes whose name is listed as an abort-on-exit runtime
//! (Go binaries) are additionally signalled after every other stage.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;

use crate::process::record::ProcessRecord;

/// Diagnostic route for a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Reports its own state when notified (resmoke's Python processes).
    SelfReporting,
    /// Attached with the platform's native debugger.
    Native,
    /// Dumped with a JVM stack utility.
    Jvm,
}

/// Routes processes by name.
#[derive(Debug, Clone)]
pub struct Classifier {
    self_reporting: Option<Regex>,
    jvm: Option<Regex>,
    abort_names: HashSet<String>,
}

impl Classifier {
    pub fn new(
        self_reporting_prefixes: &[String],
        jvm_prefixes: &[String],
        abort_names: &[String],
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            self_reporting: prefix_regex(self_reporting_prefixes)?,
            jvm: prefix_regex(jvm_prefixes)?,
            abort_names: abort_names.iter().map(|n| n.trim().to_lowercase()).collect(),
        })
    }

    pub fn category(&self, process: &ProcessRecord) -> Category {
        let name = process.name.as_str();
        if self.self_reporting.as_ref().is_some_and(|r| r.is_match(name)) {
            Category::SelfReporting
        } else if self.jvm.as_ref().is_some_and(|r| r.is_match(name)) {
            Category::Jvm
        } else {
            Category::Native
        }
    }

    /// Whether `process` should get the destructive abort signal after all
    /// other diagnosis. Only native processes qualify.
    pub fn aborts_after_diagnosis(&self, process: &ProcessRecord) -> bool {
        self.category(process) == Category::Native
            && (self.abort_names.contains(process.name.as_str())
                || self.abort_names.contains(process.base_name()))
    }
}

/// `^(p1|p2|...)`, or `None` when there are no prefixes.
fn prefix_regex(prefixes: &[String]) -> Result<Option<Regex>, regex::Error> {
    let alternatives: Vec<String> = prefixes
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .map(|p| regex::escape(&p))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!("^({})", alternatives.join("|"))).map(Some)
}
