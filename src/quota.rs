//! Dump-size quota.
//!
//! The budget is checked against what is actually on disk every time, so dumps
//! written by other tools (or by an earlier pass) count too.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Byte budget for dump files in one directory.
#[derive(Debug, Clone)]
pub struct QuotaGuard {
    dir: PathBuf,
    budget_bytes: u64,
}

impl QuotaGuard {
    pub fn new(dir: impl Into<PathBuf>, budget_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            budget_bytes,
        }
    }

    /// Budget given in megabytes (1 MB = 1024 * 1024 bytes).
    pub fn from_megabytes(dir: impl Into<PathBuf>, megabytes: u64) -> Self {
        Self::new(dir, megabytes.saturating_mul(1024 * 1024))
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    /// Whether the `*.<extension>` files in the directory total at most the budget.
    pub fn within_budget(&self, extension: &str) -> io::Result<bool> {
        let used = used_bytes(&self.dir, extension)?;
        debug!(
            "Dump quota: {} bytes of *.{} in {}, budget {}",
            used,
            extension,
            self.dir.display(),
            self.budget_bytes
        );
        Ok(used <= self.budget_bytes)
    }
}

/// Sums the sizes of regular files in `dir` whose name ends in `.<extension>`.
pub fn used_bytes(dir: &Path, extension: &str) -> io::Result<u64> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let mut total = 0u64;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(&suffix) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            // Removed between read_dir and stat.
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if meta.is_file() {
            total = total.saturating_add(meta.len());
        }
    }

    Ok(total)
}
