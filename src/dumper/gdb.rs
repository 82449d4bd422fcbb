//! GDB backend for Linux and Solaris.
//!
//! Commands are passed inline as `-ex` arguments. When a directory with the
//! MongoDB gdb extensions is configured, they are sourced and used for the
//! stack, lock and wait-graph dumps; otherwise plain `thread apply all bt` is used.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{dump_file_name, not_found, Dumper, DumperError, Outcome, ToolLocator};
use crate::invoke::run_streaming;
use crate::process::ProcessRecord;
use crate::sink::{raw_stacks_file_name, LogSink};

const DUMP_EXT: &str = "core";

pub struct GdbDumper {
    locator: ToolLocator,
    extensions_dir: Option<PathBuf>,
    solaris: bool,
}

impl GdbDumper {
    pub fn new(extensions_dir: Option<PathBuf>, solaris: bool) -> Self {
        let locator = ToolLocator::new(
            "gdb",
            vec![
                PathBuf::from("/opt/mongodbtoolchain/gdb/bin"),
                PathBuf::from("/usr/bin"),
            ],
        );
        Self::with_locator(locator, extensions_dir, solaris)
    }

    pub fn with_locator(
        locator: ToolLocator,
        extensions_dir: Option<PathBuf>,
        solaris: bool,
    ) -> Self {
        Self {
            locator,
            extensions_dir,
            solaris,
        }
    }

    fn extensions(&self) -> Option<&Path> {
        let dir = self.extensions_dir.as_deref()?;
        if dir.is_dir() {
            Some(dir)
        } else {
            warn!("gdb extensions directory {} not found, using plain backtraces", dir.display());
            None
        }
    }

    /// Ordered gdb command list for one process.
    pub fn build_commands(
        &self,
        target: &ProcessRecord,
        dump_file: Option<&str>,
        raw_stacks_file: Option<&Path>,
    ) -> Vec<String> {
        let extensions = self.extensions();
        let mut cmds = vec![
            "set interactive-mode off".to_string(),
            // Suppress messages about threads starting/finishing.
            "set print thread-events off".to_string(),
            // Solaris must load the executable to read symbols.
            format!("file {}", target.name),
            format!("attach {}", target.pid),
            "info sharedlibrary".to_string(),
            "info threads".to_string(),
            "set python print-stack full".to_string(),
        ];

        if let Some(raw) = raw_stacks_file {
            cmds.push(format!("echo \\nWriting raw stacks to {}.\\n", raw.display()));
            // Output goes to the file rather than stdout until logging is turned off.
            cmds.push("set logging redirect on".to_string());
            cmds.push(format!("set logging file {}", raw.display()));
            cmds.push("set logging on".to_string());
            cmds.push("thread apply all bt".to_string());
            cmds.push("set logging off".to_string());
        }

        match extensions {
            Some(dir) => {
                cmds.push(format!("source {}", dir.join("mongo.py").display()));
                cmds.push(format!("source {}", dir.join("mongo_printers.py").display()));
                if !self.solaris {
                    cmds.push(format!("source {}", dir.join("mongo_lock.py").display()));
                }
                cmds.push("mongodb-uniqstack mongodb-bt-if-active".to_string());
            }
            None => cmds.push("thread apply all bt".to_string()),
        }

        // Lock the scheduler before running commands that execute code in the target.
        cmds.push("set scheduler-locking on".to_string());

        if let Some(file) = dump_file {
            cmds.push(format!("gcore {}", file));
        }

        if extensions.is_some() {
            // Thread-locals and templated frames are unavailable to gdb on Solaris.
            if !self.solaris {
                cmds.push("mongodb-dump-locks".to_string());
                cmds.push("mongodb-show-locks".to_string());
                cmds.push(format!(
                    "mongodb-waitsfor-graph {}",
                    waitsfor_graph_file_name(target)
                ));
                cmds.push("mongodb-javascript-stack".to_string());
                cmds.push("mongod-dump-sessions".to_string());
            }
            cmds.push("mongodb-dump-mutexes".to_string());
        }

        cmds.push("detach".to_string());
        cmds.push("set confirm off".to_string());
        cmds.push("quit".to_string());
        cmds
    }

    /// `gdb --quiet --nx -ex <cmd> ...`
    pub fn build_args(commands: &[String]) -> Vec<String> {
        let mut args = vec!["--quiet".to_string(), "--nx".to_string()];
        for cmd in commands {
            args.push("-ex".to_string());
            args.push(cmd.clone());
        }
        args
    }
}

/// `debugger_waitsfor_<name>_<pid>.gv`
pub fn waitsfor_graph_file_name(target: &ProcessRecord) -> String {
    format!("debugger_waitsfor_{}_{}.gv", target.name, target.pid)
}

impl Dumper for GdbDumper {
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
        let Some(gdb) = self.locate() else {
            let reason = not_found(self.name(), target);
            warn!("{}", reason);
            return Ok(Outcome::skipped(reason));
        };

        info!(
            "Debugger {}, analyzing {} process with PID {}",
            gdb.display(),
            target.name,
            target.pid
        );

        let dump_file = take_dump.then(|| dump_file_name(target, DUMP_EXT));
        if let Some(file) = &dump_file {
            info!("Dumping core to {}", file);
        }

        run_streaming(&gdb, &["--version".to_string()], sink)?;

        let raw_stacks = sink.file_name().map(raw_stacks_file_name);
        let cmds = self.build_commands(target, dump_file.as_deref(), raw_stacks.as_deref());
        run_streaming(&gdb, &Self::build_args(&cmds), sink)?;

        info!("Done analyzing {} process with PID {}", target.name, target.pid);
        Ok(Outcome::Completed {
            dump_file: dump_file.map(PathBuf::from),
        })
    }
}
