//! Run outcome: the failures collected while diagnosing processes.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

use crate::process::ProcessRecord;

/// Stage of the dispatch loop a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NativeDebugger,
    JvmStackDump,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::NativeDebugger => f.write_str("native debugger"),
            Stage::JvmStackDump => f.write_str("jvm stack dump"),
        }
    }
}

/// One failed diagnostic attempt.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub pid: u32,
    pub name: String,
    pub stage: Stage,
    /// Error chain as captured at the dispatch boundary.
    pub message: String,
    pub at: DateTime<Local>,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} process {} with PID {}: {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.stage,
            self.name,
            self.pid,
            self.message
        )
    }
}

/// Append-only failure list, read once at the end of the run.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    failures: Vec<FailureRecord>,
}

impl ExecutionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, target: &ProcessRecord, stage: Stage, message: String) {
        self.failures.push(FailureRecord {
            pid: target.pid,
            name: target.name.clone(),
            stage,
            message,
            at: Local::now(),
        });
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Process exit code: 0 when nothing failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}
