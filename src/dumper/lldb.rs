//! LLDB backend for macOS.
//!
//! Old lldb builds handle `-o` arguments poorly, so commands go through a
//! temporary `--source` script file.

use std::io::Write;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use super::{dump_file_name, not_found, Dumper, DumperError, Outcome, ToolLocator};
use crate::invoke::{capture_output, run_streaming};
use crate::process::ProcessRecord;
use crate::sink::LogSink;

const DUMP_EXT: &str = "core";

/// Xcode 7.2's lldb; older ones do not run command files reliably.
pub const MIN_XCODE_LLDB: u32 = 340;

static XCODE_LLDB_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"lldb-(\d+)").expect("valid regex"));

pub struct LldbDumper {
    locator: ToolLocator,
}

impl LldbDumper {
    pub fn new() -> Self {
        Self::with_locator(ToolLocator::new("lldb", vec![PathBuf::from("/usr/bin")]))
    }

    pub fn with_locator(locator: ToolLocator) -> Self {
        Self { locator }
    }

    pub fn build_commands(target: &ProcessRecord, dump_file: Option<&str>) -> Vec<String> {
        let mut cmds = vec![
            format!("attach -p {}", target.pid),
            "target modules list".to_string(),
            "thread backtrace all".to_string(),
        ];
        if let Some(file) = dump_file {
            cmds.push(format!("process save-core {}", file));
        }
        cmds.push("process detach".to_string());
        cmds.push("settings set interpreter.prompt-on-quit false".to_string());
        cmds.push("quit".to_string());
        cmds
    }
}

impl Default for LldbDumper {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks `lldb --version` output.
///
/// LLVM builds print `lldb version X.Y.Z` and are always accepted. Xcode builds
/// print `lldb-NNN.x.y` and must be at least [`MIN_XCODE_LLDB`].
pub fn lldb_version_supported(version: &str) -> Result<(), String> {
    if version.contains("version") {
        return Ok(());
    }
    let Some(caps) = XCODE_LLDB_VERSION.captures(version) else {
        // Unknown format; let lldb itself decide.
        return Ok(());
    };
    match caps[1].parse::<u32>() {
        Ok(major) if major < MIN_XCODE_LLDB => Err(format!(
            "Debugger lldb is too old (lldb-{}), please upgrade to XCode 7.2",
            major
        )),
        _ => Ok(()),
    }
}

impl Dumper for LldbDumper {
    fn name(&self) -> &str {
        self.locator.program()
    }

    fn dump_ext(&self) -> Option<&'static str> {
        Some(DUMP_EXT)
    }

    fn locate(&self) -> Option<PathBuf> {
        self.locator.resolve()
    }

    fn dump_info(
        &self,
        target: &ProcessRecord,
        take_dump: bool,
        sink: &mut dyn LogSink,
    ) -> Result<Outcome, DumperError> {
        let Some(lldb) = self.locate() else {
            let reason = not_found(self.name(), target);
            warn!("{}", reason);
            return Ok(Outcome::skipped(reason));
        };

        info!(
            "Debugger {}, analyzing {} process with PID {}",
            lldb.display(),
            target.name,
            target.pid
        );

        let version = capture_output(&lldb, &["--version".to_string()])?;
        sink.line(version.trim());
        if let Err(reason) = lldb_version_supported(&version) {
            warn!("{}", reason);
            return Ok(Outcome::skipped(reason));
        }

        let dump_file = take_dump.then(|| dump_file_name(target, DUMP_EXT));
        if let Some(file) = &dump_file {
            info!("Dumping core to {}", file);
        }

        let cmds = Self::build_commands(target, dump_file.as_deref());
        let mut script = tempfile::Builder::new()
            .prefix("lldb-")
            .suffix(".cmds")
            .tempfile()
            .map_err(DumperError::Script)?;
        for cmd in &cmds {
            writeln!(script, "{}", cmd).map_err(DumperError::Script)?;
        }
        script.flush().map_err(DumperError::Script)?;

        sink.line(&format!("{}:", script.path().display()));
        for cmd in &cmds {
            sink.line(cmd);
        }

        let args = vec![
            "--source".to_string(),
            script.path().display().to_string(),
        ];
        run_streaming(&lldb, &args, sink)?;

        info!("Done analyzing {} process with PID {}", target.name, target.pid);
        Ok(Outcome::Completed {
            dump_file: dump_file.map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_with_core() {
        let target = ProcessRecord::new(99, "mongos");
        let cmds = LldbDumper::build_commands(&target, Some("dump_mongos.99.core"));
        assert_eq!(
            cmds,
            vec![
                "attach -p 99",
                "target modules list",
                "thread backtrace all",
                "process save-core dump_mongos.99.core",
                "process detach",
                "settings set interpreter.prompt-on-quit false",
                "quit",
            ]
        );
    }

    #[test]
    fn test_commands_without_core() {
        let target = ProcessRecord::new(99, "mongos");
        let cmds = LldbDumper::build_commands(&target, None);
        assert!(!cmds.iter().any(|c| c.starts_with("process save-core")));
    }

    #[test]
    fn test_version_check() {
        assert!(lldb_version_supported("lldb version 3.7.0 ( revision )").is_ok());
        assert!(lldb_version_supported("lldb-1300.0.42.3\nSwift version 5.5").is_ok());
        assert!(lldb_version_supported("lldb-340.4.119").is_ok());
        let err = lldb_version_supported("lldb-320.4.115.3").unwrap_err();
        assert!(err.contains("too old"));
        assert!(lldb_version_supported("something unexpected").is_ok());
    }

    #[cfg(unix)]
    mod dump_info {
        use super::*;
        use crate::dumper::fake_tool;
        use crate::sink::MemorySink;
        use tempfile::tempdir;

        fn fake_lldb(dir: &std::path::Path, version: &str, on_source: &str) -> LldbDumper {
            let body = format!(
                "if [ \"$1\" = \"--version\" ]; then echo {}; else {}; fi",
                version, on_source
            );
            fake_tool::install(dir, "lldb", &body);
            LldbDumper::with_locator(fake_tool::locator(dir, "lldb"))
        }

        #[test]
        fn test_missing_lldb_is_skipped() {
            let dir = tempdir().unwrap();
            let lldb = LldbDumper::with_locator(fake_tool::missing(dir.path()));
            let mut sink = MemorySink::new();

            let outcome = lldb
                .dump_info(&ProcessRecord::new(99, "mongos"), false, &mut sink)
                .unwrap();

            assert!(outcome.diagnostic().contains("not found"));
            assert!(sink.lines.is_empty());
        }

        #[test]
        fn test_old_xcode_lldb_is_skipped_before_attach() {
            let dir = tempdir().unwrap();
            let lldb = fake_lldb(dir.path(), "lldb-320.4.115.3", "exit 9");
            let mut sink = MemorySink::new();

            let outcome = lldb
                .dump_info(&ProcessRecord::new(99, "mongos"), true, &mut sink)
                .unwrap();

            assert!(!outcome.is_ok());
            assert!(outcome.diagnostic().contains("too old"));
            assert_eq!(sink.lines, vec!["lldb-320.4.115.3"]);
        }

        #[test]
        fn test_script_is_echoed_and_sourced() {
            let dir = tempdir().unwrap();
            let lldb = fake_lldb(dir.path(), "lldb-1300.0.42.3", "cat \"$2\"");
            let mut sink = MemorySink::new();

            let outcome = lldb
                .dump_info(&ProcessRecord::new(99, "mongos"), true, &mut sink)
                .unwrap();

            assert!(outcome.is_ok());
            assert_eq!(sink.lines[0], "lldb-1300.0.42.3");
            let source = format!("{} --source ", dir.path().join("lldb").display());
            assert!(sink.lines.iter().any(|l| l.starts_with(&source)));
            // Once from the echoed script, once from lldb reading it.
            let saves = sink
                .lines
                .iter()
                .filter(|l| *l == "process save-core dump_mongos.99.core")
                .count();
            assert_eq!(saves, 2);
        }

        #[test]
        fn test_failing_lldb_carries_exit_code() {
            let dir = tempdir().unwrap();
            let lldb = fake_lldb(dir.path(), "lldb-1300.0.42.3", "exit 5");
            let mut sink = MemorySink::new();

            let err = lldb
                .dump_info(&ProcessRecord::new(99, "mongos"), false, &mut sink)
                .unwrap_err();

            assert!(err.to_string().starts_with("Bad exit code 5 from"));
        }
    }
}
