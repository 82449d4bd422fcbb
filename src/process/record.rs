//! Canonical (pid, name) process records.

use serde::Serialize;
use std::fmt;

/// A running process as seen by one enumeration pass.
///
/// Names are lower-cased on construction so matching is case-insensitive
/// (e.g. `/System/Library/.../Python` on macOS matches `python`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
}

impl ProcessRecord {
    pub fn new(pid: u32, name: &str) -> Self {
        Self {
            pid,
            name: name.to_lowercase(),
        }
    }

    /// Name with any file extension removed (`mongod.exe` -> `mongod`).
    pub fn base_name(&self) -> &str {
        strip_extension(&self.name)
    }
}

impl fmt::Display for ProcessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.pid)
    }
}

/// Removes the last `.ext` suffix. Leading dots do not start an extension.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => &name[..idx],
        _ => name,
    }
}

/// Last path component of a command string (`/usr/bin/mongod` -> `mongod`).
///
/// Both separators are accepted since Windows paths show up in Cygwin listings.
pub fn last_path_component(command: &str) -> &str {
    command
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(command)
}
