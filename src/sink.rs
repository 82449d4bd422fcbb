//! Per-process output sinks.
//!
//! Tool output for a diagnosed process is written line by line to a [`LogSink`].
//! The production sink, [`ProcessLogger`], writes undecorated lines to stdout
//! and/or to `debugger_<base>.<pid>.log`, matching the `debugger_output` setting.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::process::ProcessRecord;

/// Where per-process debugger output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebuggerOutput {
    Stdout,
    File,
}

impl std::str::FromStr for DebuggerOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(DebuggerOutput::Stdout),
            "file" => Ok(DebuggerOutput::File),
            other => Err(format!(
                "Invalid debugger output '{}', expected 'stdout' or 'file'",
                other
            )),
        }
    }
}

/// Destination for tool output lines.
pub trait LogSink {
    /// Writes one line of output.
    fn line(&mut self, line: &str);

    /// Name of the backing log file, if output is being recorded to one.
    fn file_name(&self) -> Option<&Path> {
        None
    }
}

/// Sink for one diagnosed process.
pub struct ProcessLogger {
    stdout: bool,
    file: Option<(PathBuf, File)>,
}

impl ProcessLogger {
    /// Builds a logger for `target`.
    ///
    /// A log file that cannot be created is reported and the logger falls back
    /// to whatever other outputs were requested.
    pub fn new(outputs: &[DebuggerOutput], target: &ProcessRecord) -> Self {
        let stdout = outputs.contains(&DebuggerOutput::Stdout);
        let file = if outputs.contains(&DebuggerOutput::File) {
            let path = PathBuf::from(log_file_name(target));
            match File::create(&path) {
                Ok(f) => Some((path, f)),
                Err(e) => {
                    warn!("Cannot create debugger log {}: {}", path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        Self { stdout, file }
    }
}

impl LogSink for ProcessLogger {
    fn line(&mut self, line: &str) {
        if self.stdout {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            let _ = writeln!(lock, "{}", line);
        }
        if let Some((_, f)) = self.file.as_mut() {
            let _ = writeln!(f, "{}", line);
        }
    }

    fn file_name(&self) -> Option<&Path> {
        self.file.as_ref().map(|(p, _)| p.as_path())
    }
}

/// In-memory sink; keeps every line.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
    pub file_name: Option<PathBuf>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl LogSink for MemorySink {
    fn line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn file_name(&self) -> Option<&Path> {
        self.file_name.as_deref()
    }
}

/// `debugger_<base>.<pid>.log`
pub fn log_file_name(target: &ProcessRecord) -> String {
    format!("debugger_{}.{}.log", target.base_name(), target.pid)
}

/// Companion file for raw stacks: `<stem>_raw_stacks<.ext>` next to `log_file`.
pub fn raw_stacks_file_name(log_file: &Path) -> PathBuf {
    let stem = log_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match log_file.extension() {
        Some(ext) => format!("{}_raw_stacks.{}", stem, ext.to_string_lossy()),
        None => format!("{}_raw_stacks", stem),
    };
    log_file.with_file_name(name)
}
