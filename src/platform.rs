//! Platform detection.
//!
//! Every OS-specific choice (process lister, native debugger, signal primitive)
//! is made once from the [`Platform`] returned by [`Platform::current`].

use serde::Serialize;
use std::fmt;

/// Operating system families the analyzer knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Solaris,
    Darwin,
    Windows,
}

impl Platform {
    /// Detects the platform this binary was built for.
    ///
    /// Returns `None` on targets without a process lister (e.g. FreeBSD).
    pub fn current() -> Option<Platform> {
        if cfg!(target_os = "linux") {
            Some(Platform::Linux)
        } else if cfg!(any(target_os = "solaris", target_os = "illumos")) {
            Some(Platform::Solaris)
        } else if cfg!(target_os = "macos") {
            Some(Platform::Darwin)
        } else if cfg!(windows) {
            Some(Platform::Windows)
        } else {
            None
        }
    }

    /// Whether the platform delivers POSIX signals.
    pub fn has_posix_signals(self) -> bool {
        !matches!(self, Platform::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Linux => "linux",
            Platform::Solaris => "solaris",
            Platform::Darwin => "darwin",
            Platform::Windows => "windows",
        };
        f.write_str(name)
    }
}
