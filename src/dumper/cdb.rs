//! CDB backend for Windows.

use std::path::PathBuf;

use tracing::{info, warn};

use super::{dump_file_name, not_found, Dumper, DumperError, Outcome, ToolLocator};
use crate::invoke::run_streaming;
use crate::process::ProcessRecord;
use crate::sink::LogSink;

const DUMP_EXT: &str = "mdmp";

pub struct CdbDumper {
    locator: ToolLocator,
}

impl CdbDumper {
    pub fn new() -> Self {
        let root = std::env::var("ProgramFiles(x86)")
            .unwrap_or_else(|_| "C:\\Program Files (x86)".to_string());
        Self::with_locator(ToolLocator::new(
            "cdb.exe",
            windows_kits_dirs(&PathBuf::from(root)),
        ))
    }

    pub fn with_locator(locator: ToolLocator) -> Self {
        Self { locator }
    }

    pub fn build_commands(dump_file: Option<&str>) -> Vec<String> {
        let mut cmds = vec![
            // Fix up the symbol path.
            ".symfix".to_string(),
            // Enable line loading (off by default in CDB, on in WinDBG).
            ".symopt +0x10".to_string(),
            ".reload".to_string(),
            // Current exe and environment variables.
            "!peb".to_string(),
            "lm".to_string(),
        ];
        if let Some(file) = dump_file {
            cmds.push(format!(".dump /ma {}", file));
        }
        cmds.push("!uniqstack -pn".to_string());
        // Locked critical sections.
        cmds.push("!cs -l".to_string());
        cmds.push(".detach".to_string());
        cmds.push("q".to_string());
        cmds
    }

    /// `cdb.exe -c "<cmd>;<cmd>;..." -p <pid>`
    pub fn build_args(target: &ProcessRecord, commands: &[String]) -> Vec<String> {
        vec![
            "-c".to_string(),
            commands.join(";"),
            "-p".to_string(),
            target.pid.to_string(),
        ]
    }
}

impl Default for CdbDumper {
    fn default() -> Self {
        Self::new()
    }
}

/// Debugger directories of installed Windows Kits, most recent first.
pub fn windows_kits_dirs(program_files_x86: &std::path::Path) -> Vec<PathBuf> {
    let kits = program_files_x86.join("Windows Kits");
    ["10", "8.1", "8.0"]
        .iter()
        .map(|v| kits.join(v).join("Debuggers").join("x64"))
        .collect()
}

impl Dumper for CdbDumper {
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
        let Some(cdb) = self.locate() else {
            let reason = not_found(self.name(), target);
            warn!("{}", reason);
            return Ok(Outcome::skipped(reason));
        };

        info!(
            "Debugger {}, analyzing {} process with PID {}",
            cdb.display(),
            target.name,
            target.pid
        );

        let dump_file = take_dump.then(|| dump_file_name(target, DUMP_EXT));
        if let Some(file) = &dump_file {
            info!("Dumping core to {}", file);
        }

        let cmds = Self::build_commands(dump_file.as_deref());
        run_streaming(&cdb, &Self::build_args(target, &cmds), sink)?;

        info!("Done analyzing {} process with PID {}", target.name, target.pid);
        Ok(Outcome::Completed {
            dump_file: dump_file.map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_args_with_minidump() {
        let target = ProcessRecord::new(808, "mongod.exe");
        let cmds = CdbDumper::build_commands(Some(&dump_file_name(&target, DUMP_EXT)));
        let args = CdbDumper::build_args(&target, &cmds);

        assert_eq!(args[0], "-c");
        assert_eq!(
            args[1],
            ".symfix;.symopt +0x10;.reload;!peb;lm;.dump /ma dump_mongod.808.mdmp;!uniqstack -pn;!cs -l;.detach;q"
        );
        assert_eq!(&args[2..], &["-p".to_string(), "808".to_string()]);
    }

    #[test]
    fn test_no_empty_commands_without_dump() {
        let cmds = CdbDumper::build_commands(None);
        assert!(!cmds.join(";").contains(";;"));
        assert!(!cmds.iter().any(|c| c.starts_with(".dump")));
    }

    #[test]
    fn test_windows_kits_dirs_order() {
        let dirs = windows_kits_dirs(Path::new("C:/PF86"));
        assert_eq!(dirs.len(), 3);
        assert!(dirs[0].ends_with("Windows Kits/10/Debuggers/x64"));
        assert!(dirs[2].ends_with("Windows Kits/8.0/Debuggers/x64"));
    }

    #[cfg(unix)]
    mod dump_info {
        use super::*;
        use crate::dumper::fake_tool;
        use crate::sink::MemorySink;
        use tempfile::tempdir;

        #[test]
        fn test_missing_cdb_is_skipped() {
            let dir = tempdir().unwrap();
            let cdb = CdbDumper::with_locator(fake_tool::missing(dir.path()));
            let mut sink = MemorySink::new();

            let outcome = cdb
                .dump_info(&ProcessRecord::new(808, "mongod.exe"), true, &mut sink)
                .unwrap();

            assert!(outcome.diagnostic().contains("not found"));
            assert!(sink.lines.is_empty());
        }

        #[test]
        fn test_minidump_requested_on_command_line() {
            let dir = tempdir().unwrap();
            let tool = fake_tool::install(dir.path(), "cdb.exe", "echo \"attached to $4\"");
            let cdb = CdbDumper::with_locator(fake_tool::locator(dir.path(), "cdb.exe"));
            let mut sink = MemorySink::new();

            let outcome = cdb
                .dump_info(&ProcessRecord::new(808, "mongod.exe"), true, &mut sink)
                .unwrap();

            assert_eq!(
                outcome,
                Outcome::Completed {
                    dump_file: Some(PathBuf::from("dump_mongod.808.mdmp"))
                }
            );
            assert!(sink.lines[0].starts_with(&format!("{} -c .symfix;", tool.display())));
            assert!(sink.lines[0].contains(".dump /ma dump_mongod.808.mdmp"));
            assert!(sink.lines[0].ends_with(" -p 808"));
            assert_eq!(sink.lines[1], "attached to 808");
        }

        #[test]
        fn test_failing_cdb_carries_exit_code() {
            let dir = tempdir().unwrap();
            fake_tool::install(dir.path(), "cdb.exe", "exit 4");
            let cdb = CdbDumper::with_locator(fake_tool::locator(dir.path(), "cdb.exe"));
            let mut sink = MemorySink::new();

            let err = cdb
                .dump_info(&ProcessRecord::new(808, "mongod.exe"), false, &mut sink)
                .unwrap_err();

            assert!(err.to_string().contains("Bad exit code 4"));
            assert_eq!(sink.lines.last().map(String::as_str), Some("Bad exit code 4"));
        }
    }
}
