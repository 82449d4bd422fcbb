//! Diagnostic backends.
//!
//! A [`Dumper`] knows how to find one external tool, build its command line or
//! script for a given process, run it, and stream the output to a [`LogSink`].
//! Backends are selected once per run from the [`Platform`]:
//!
//! | Platform | native debugger | JVM |
//! |---|---|---|
//! | Linux, Solaris | `gdb` | `jstack` |
//! | Darwin | `lldb` | `jstack` |
//! | Windows | `cdb.exe` | unsupported |

pub mod cdb;
pub mod gdb;
pub mod jstack;
pub mod lldb;

use std::io;
use std::path::PathBuf;

use once_cell::unsync::OnceCell;
use tracing::debug;

use crate::invoke::{find_program, InvokeError};
use crate::platform::Platform;
use crate::process::ProcessRecord;
use crate::sink::LogSink;

pub use cdb::CdbDumper;
pub use gdb::GdbDumper;
pub use jstack::{JstackDumper, JstackUnsupported};
pub use lldb::LldbDumper;

/// Result of a backend run that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The tool ran and exited cleanly.
    Completed { dump_file: Option<PathBuf> },
    /// Nothing was run: tool missing, too old or unsupported here.
    Skipped { reason: String },
}

impl Outcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    /// One-line description for logs.
    pub fn diagnostic(&self) -> String {
        match self {
            Outcome::Completed {
                dump_file: Some(f),
            } => format!("completed, dump written to {}", f.display()),
            Outcome::Completed { dump_file: None } => "completed".to_string(),
            Outcome::Skipped { reason } => reason.clone(),
        }
    }
}

/// Failures that count against the run.
#[derive(Debug, thiserror::Error)]
pub enum DumperError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("Failed to write debugger script: {0}")]
    Script(#[source] io::Error),
}

/// A diagnostic backend for one (platform, runtime) pair.
pub trait Dumper {
    /// Tool name, e.g. `gdb`.
    fn name(&self) -> &str;

    /// Extension of dump files this backend writes, if it writes any.
    fn dump_ext(&self) -> Option<&'static str> {
        None
    }

    /// Resolved tool path, `None` if the tool is not installed.
    fn locate(&self) -> Option<PathBuf>;

    /// Attaches to `target`, writes its stacks to `sink`, and takes a dump
    /// when `take_dump` is set and the backend supports it.
    fn dump_info(
        &self,
        target: &ProcessRecord,
        take_dump: bool,
        sink: &mut dyn LogSink,
    ) -> Result<Outcome, DumperError>;
}

/// Lazily resolved, cached tool path.
#[derive(Debug)]
pub struct ToolLocator {
    program: String,
    dirs: Vec<PathBuf>,
    resolved: OnceCell<Option<PathBuf>>,
}

impl ToolLocator {
    /// Searches `dirs` in order, then `PATH`.
    pub fn new(program: &str, dirs: Vec<PathBuf>) -> Self {
        Self {
            program: program.to_string(),
            dirs,
            resolved: OnceCell::new(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn resolve(&self) -> Option<PathBuf> {
        self.resolved
            .get_or_init(|| {
                debug!("Looking for {} in {:?}, then PATH", self.program, self.dirs);
                find_program(&self.program, &self.dirs)
            })
            .clone()
    }
}

/// Settings shared by the native debugger backends.
#[derive(Debug, Clone, Default)]
pub struct DumperSettings {
    /// Directory holding `mongo.py`, `mongo_printers.py` and `mongo_lock.py`.
    pub gdb_extensions_dir: Option<PathBuf>,
}

/// `dump_<base>.<pid>.<ext>`
pub fn dump_file_name(target: &ProcessRecord, ext: &str) -> String {
    format!("dump_{}.{}.{}", target.base_name(), target.pid, ext)
}

/// Message used when a backend's tool cannot be found.
pub fn not_found(tool: &str, target: &ProcessRecord) -> String {
    format!("Debugger {} not found, skipping dumping of {}", tool, target.pid)
}

pub fn native_dumper_for(platform: Platform, settings: &DumperSettings) -> Box<dyn Dumper> {
    match platform {
        Platform::Linux => Box::new(GdbDumper::new(settings.gdb_extensions_dir.clone(), false)),
        Platform::Solaris => Box::new(GdbDumper::new(settings.gdb_extensions_dir.clone(), true)),
        Platform::Darwin => Box::new(LldbDumper::new()),
        Platform::Windows => Box::new(CdbDumper::new()),
    }
}

pub fn jvm_dumper_for(platform: Platform) -> Box<dyn Dumper> {
    match platform {
        Platform::Windows => Box::new(JstackUnsupported),
        _ => Box::new(JstackDumper::new()),
    }
}
