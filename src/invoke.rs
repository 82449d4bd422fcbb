//! External tool invocation.
//!
//! Two shapes of invocation are used: [`capture_output`] for short commands whose
//! stdout is parsed (`ps`, `tasklist`, `--version`), and [`run_streaming`] for
//! debuggers, whose stdout and stderr are merged and forwarded line by line to a
//! [`LogSink`] while the tool is still running.

use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use tracing::{debug, error, warn};

use crate::sink::LogSink;

/// Errors from running an external tool.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Bad exit code {code} from {command}")]
    BadExitCode { code: i32, command: String },
}

/// Looks for `program` in each of `dirs` first, then on `PATH`.
pub fn find_program(program: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    for dir in dirs {
        let candidate = dir.join(program);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    which::which(program).ok()
}

/// Human-readable command line for logs and error messages.
pub fn command_line(program: &Path, args: &[String]) -> String {
    let mut out = program.display().to_string();
    for arg in args {
        out.push(' ');
        out.push_str(arg);
    }
    out
}

/// Runs a command to completion and returns its stdout (lossy UTF-8).
pub fn capture_output(program: &Path, args: &[String]) -> Result<String, InvokeError> {
    let command = command_line(program, args);
    debug!("{}", command);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| InvokeError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(InvokeError::BadExitCode {
            code: output.status.code().unwrap_or(-1),
            command,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs a command, forwarding every stdout/stderr line to `sink` as it arrives.
///
/// Both pipes are drained on reader threads so a chatty tool can never block on
/// a full pipe; the call returns only after both readers hit EOF and the child
/// has exited. A non-zero exit is logged to the sink and returned as an error.
///
/// Lines keep their order within each stream. Across stdout and stderr they are
/// interleaved in arrival order, which only approximates the order the tool
/// wrote them in.
pub fn run_streaming(
    program: &Path,
    args: &[String],
    sink: &mut dyn LogSink,
) -> Result<(), InvokeError> {
    let command = command_line(program, args);
    sink.line(&command);

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| InvokeError::Spawn {
            command: command.clone(),
            source,
        })?;

    let (tx, rx) = mpsc::channel::<String>();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_line_reader(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_line_reader(stderr, tx.clone()));
    }
    drop(tx);

    for line in rx {
        sink.line(&line);
    }

    let status = child.wait().map_err(|source| InvokeError::Spawn {
        command: command.clone(),
        source,
    })?;

    join_readers(readers, &command);

    if status.success() {
        Ok(())
    } else {
        let code = status.code().unwrap_or(-1);
        error!("Bad exit code {} from {}", code, command);
        sink.line(&format!("Bad exit code {}", code));
        Err(InvokeError::BadExitCode { code, command })
    }
}

/// Waits for the reader threads; returns how many of them panicked.
fn join_readers(readers: Vec<thread::JoinHandle<()>>, command: &str) -> usize {
    let mut panicked = 0;
    for reader in readers {
        if reader.join().is_err() {
            warn!("Output reader for {} panicked, some output may be lost", command);
            panicked += 1;
        }
    }
    panicked
}

fn spawn_line_reader<R: Read + Send + 'static>(
    pipe: R,
    tx: mpsc::Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(&['\r', '\n'][..]);
                    if tx.send(line.to_string()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    })
}
