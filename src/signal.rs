//! Signal-based diagnosis for cooperative runtimes.
//!
//! Self-reporting processes (resmoke's Python) dump their own state when
//! notified: `SIGUSR1` on POSIX, the named event `Global\Mongo_Python_<pid>` on
//! Windows. Go processes print all goroutine stacks and exit on `SIGABRT`; on
//! Windows there is no such signal, so they are terminated.
//!
//! After a successful delivery the signaller waits a settle period so the target
//! can finish reporting before anything else touches it.

use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::info;

use crate::process::ProcessRecord;

/// Default time given to a notified process to report.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(5);

/// What to ask of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Non-destructive: report and keep running.
    Report,
    /// Destructive: report (if possible) and exit.
    Abort,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, cfg!(windows)) {
            (Notification::Report, false) => f.write_str("SIGUSR1"),
            (Notification::Report, true) => f.write_str("SetEvent"),
            (Notification::Abort, false) => f.write_str("SIGABRT"),
            (Notification::Abort, true) => f.write_str("TerminateProcess"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("No such process {0}")]
    NoSuchProcess(u32),

    #[error("Permission denied signalling process {0}")]
    PermissionDenied(u32),

    #[error("Cannot deliver {0} on this platform")]
    Unsupported(Notification),

    #[error("Hit OS error trying to signal process {pid}: {source}")]
    Os {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Delivers notifications to processes.
pub trait Signaller {
    fn notify(&self, target: &ProcessRecord, notification: Notification)
        -> Result<(), SignalError>;
}

/// Signaller backed by the host OS.
#[derive(Debug, Clone)]
pub struct OsSignaller {
    settle: Duration,
}

impl OsSignaller {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }
}

impl Default for OsSignaller {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE)
    }
}

impl Signaller for OsSignaller {
    fn notify(
        &self,
        target: &ProcessRecord,
        notification: Notification,
    ) -> Result<(), SignalError> {
        deliver(target.pid, notification)?;

        if !self.settle.is_zero() {
            info!("Waiting for process to report");
            thread::sleep(self.settle);
        }
        Ok(())
    }
}

#[cfg(unix)]
fn deliver(pid: u32, notification: Notification) -> Result<(), SignalError> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // 0 and anything past i32::MAX would address process groups.
    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => return Err(SignalError::NoSuchProcess(pid)),
    };

    let signal = match notification {
        Notification::Report => Signal::SIGUSR1,
        Notification::Abort => Signal::SIGABRT,
    };

    kill(Pid::from_raw(raw), signal).map_err(|errno| match errno {
        Errno::ESRCH => SignalError::NoSuchProcess(pid),
        Errno::EPERM => SignalError::PermissionDenied(pid),
        other => SignalError::Os {
            pid,
            source: std::io::Error::from_raw_os_error(other as i32),
        },
    })
}

#[cfg(windows)]
fn deliver(pid: u32, notification: Notification) -> Result<(), SignalError> {
    match notification {
        Notification::Report => windows::set_event(pid),
        Notification::Abort => windows::terminate(pid),
    }
}

#[cfg(not(any(unix, windows)))]
fn deliver(_pid: u32, notification: Notification) -> Result<(), SignalError> {
    Err(SignalError::Unsupported(notification))
}

#[cfg(windows)]
mod windows {
    use super::SignalError;
    use std::io;
    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::Threading::{
        OpenEventW, OpenProcess, SetEvent, TerminateProcess, EVENT_MODIFY_STATE,
        PROCESS_TERMINATE,
    };

    /// Exit code Python's `os.kill(pid, SIGABRT)` leaves on Windows.
    const ABORT_EXIT_CODE: u32 = 22;

    pub fn event_name(pid: u32) -> String {
        format!("Global\\Mongo_Python_{}", pid)
    }

    fn os_error(pid: u32) -> SignalError {
        SignalError::Os {
            pid,
            source: io::Error::last_os_error(),
        }
    }

    pub fn set_event(pid: u32) -> Result<(), SignalError> {
        let name: Vec<u16> = event_name(pid).encode_utf16().chain(Some(0)).collect();
        // SAFETY: `name` is a NUL-terminated UTF-16 string that outlives the call.
        let handle = unsafe { OpenEventW(EVENT_MODIFY_STATE, 0, name.as_ptr()) };
        if handle.is_null() {
            return Err(os_error(pid));
        }
        // SAFETY: `handle` is a valid event handle opened above and closed once.
        let ok = unsafe { SetEvent(handle) };
        let result = if ok == 0 { Err(os_error(pid)) } else { Ok(()) };
        // SAFETY: `handle` is still open and is not used after this call.
        unsafe { CloseHandle(handle) };
        result
    }

    pub fn terminate(pid: u32) -> Result<(), SignalError> {
        // SAFETY: plain Win32 call; a null handle is checked below.
        let handle = unsafe { OpenProcess(PROCESS_TERMINATE, 0, pid) };
        if handle.is_null() {
            return Err(os_error(pid));
        }
        // SAFETY: `handle` was opened with PROCESS_TERMINATE and is closed once.
        let ok = unsafe { TerminateProcess(handle, ABORT_EXIT_CODE) };
        let result = if ok == 0 { Err(os_error(pid)) } else { Ok(()) };
        // SAFETY: `handle` is still open and is not used after this call.
        unsafe { CloseHandle(handle) };
        result
    }
}
