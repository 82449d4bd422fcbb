//! OS-specific process enumeration.
//!
//! Each lister shells out to the platform's own tool (`ps` with OS-specific
//! columns, or `tasklist` on Windows) and parses its text output into
//! [`ProcessRecord`]s. Any failure here is fatal for the run: without a process
//! list there is nothing to diagnose.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::invoke::{capture_output, find_program, InvokeError};
use crate::platform::Platform;
use crate::process::record::{last_path_component, ProcessRecord};

/// Errors that prevent enumerating processes.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("Process listing tool {0} not found")]
    ToolNotFound(String),

    #[error("Hang analyzer: Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

/// Enumerates all processes on the host.
pub trait ProcessLister {
    fn list(&self) -> Result<Vec<ProcessRecord>, ListError>;
}

/// Returns the lister for `platform`.
pub fn lister_for(platform: Platform) -> Box<dyn ProcessLister> {
    match platform {
        Platform::Linux => Box::new(LinuxProcessList),
        Platform::Solaris => Box::new(SolarisProcessList),
        Platform::Darwin => Box::new(DarwinProcessList),
        Platform::Windows => Box::new(WindowsProcessList),
    }
}

/// Returns the lister for the running OS, or an error on unsupported targets.
pub fn current_lister() -> Result<Box<dyn ProcessLister>, ListError> {
    Platform::current()
        .map(lister_for)
        .ok_or_else(|| ListError::UnsupportedPlatform(std::env::consts::OS.to_string()))
}

fn find_ps(dirs: &[&str]) -> Result<PathBuf, ListError> {
    let dirs: Vec<PathBuf> = dirs.iter().map(PathBuf::from).collect();
    find_program("ps", &dirs).ok_or_else(|| ListError::ToolNotFound("ps".to_string()))
}

/// `ps -eo pid,args` (procps).
pub struct LinuxProcessList;

impl ProcessLister for LinuxProcessList {
    fn list(&self) -> Result<Vec<ProcessRecord>, ListError> {
        let ps = find_ps(&["/bin", "/usr/bin"])?;
        info!("Getting list of processes using {}", ps.display());

        let version = capture_output(&ps, &["--version".to_string()])?;
        info!("{}", version.trim());

        let out = capture_output(&ps, &["-eo".to_string(), "pid,args".to_string()])?;
        Ok(parse_ps_args(&out))
    }
}

/// `ps -eo pid,args` (SunOS).
pub struct SolarisProcessList;

impl ProcessLister for SolarisProcessList {
    fn list(&self) -> Result<Vec<ProcessRecord>, ListError> {
        let ps = find_ps(&["/bin", "/usr/bin"])?;
        info!("Getting list of processes using {}", ps.display());

        let out = capture_output(&ps, &["-eo".to_string(), "pid,args".to_string()])?;
        Ok(parse_ps_args(&out))
    }
}

/// `ps -axco pid,comm` (BSD ps).
pub struct DarwinProcessList;

impl ProcessLister for DarwinProcessList {
    fn list(&self) -> Result<Vec<ProcessRecord>, ListError> {
        let ps = find_ps(&["/bin"])?;
        info!("Getting list of processes using {}", ps.display());

        let out = capture_output(&ps, &["-axco".to_string(), "pid,comm".to_string()])?;
        Ok(parse_ps_comm(&out))
    }
}

/// `tasklist /FO CSV`.
pub struct WindowsProcessList;

impl WindowsProcessList {
    fn find_tasklist() -> Result<PathBuf, ListError> {
        if let Ok(windir) = std::env::var("WINDIR") {
            let path = PathBuf::from(windir).join("system32").join("tasklist.exe");
            if path.exists() {
                return Ok(path);
            }
        }
        find_program("tasklist.exe", &[])
            .ok_or_else(|| ListError::ToolNotFound("tasklist.exe".to_string()))
    }
}

impl ProcessLister for WindowsProcessList {
    fn list(&self) -> Result<Vec<ProcessRecord>, ListError> {
        let tasklist = Self::find_tasklist()?;
        info!("Getting list of processes using {}", tasklist.display());

        let out = capture_output(&tasklist, &["/FO".to_string(), "CSV".to_string()])?;
        Ok(parse_tasklist_csv(&out))
    }
}

/// Parses `pid args...` rows; the name is the last path component of the
/// executable (first token of `args`).
pub fn parse_ps_args(output: &str) -> Vec<ProcessRecord> {
    output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let pid = parse_pid(tokens.next()?)?;
            let exe = tokens.next()?;
            Some(ProcessRecord::new(pid, last_path_component(exe)))
        })
        .collect()
}

/// Parses `pid comm` rows where `comm` may contain spaces.
pub fn parse_ps_comm(output: &str) -> Vec<ProcessRecord> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let (pid, rest) = line.split_once(char::is_whitespace)?;
            let pid = parse_pid(pid)?;
            let comm = rest.trim();
            if comm.is_empty() {
                return None;
            }
            Some(ProcessRecord::new(pid, last_path_component(comm)))
        })
        .collect()
}

/// Parses `"Image Name","PID",...` rows from `tasklist /FO CSV`.
pub fn parse_tasklist_csv(output: &str) -> Vec<ProcessRecord> {
    output
        .lines()
        .filter_map(|line| {
            let fields = split_csv_line(line);
            if fields.len() < 2 {
                return None;
            }
            let pid = parse_pid(&fields[1])?;
            Some(ProcessRecord::new(pid, &fields[0]))
        })
        .collect()
}

/// Header rows ("PID") and garbage rows yield `None`.
fn parse_pid(field: &str) -> Option<u32> {
    let field = field.trim();
    if field == "PID" {
        return None;
    }
    match field.parse() {
        Ok(pid) => Some(pid),
        Err(_) => {
            debug!("Skipping process row with unparsable pid '{}'", field);
            None
        }
    }
}

/// Minimal CSV splitter: double-quoted fields, `""` escapes, comma separators.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if !line.is_empty() {
        fields.push(field);
    }
    fields
}
