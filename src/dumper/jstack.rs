//! JVM thread dumps with the JDK's `jstack`.

use std::path::PathBuf;

use tracing::{info, warn};

use super::{not_found, Dumper, DumperError, Outcome, ToolLocator};
use crate::invoke::run_streaming;
use crate::process::ProcessRecord;
use crate::sink::LogSink;

pub struct JstackDumper {
    locator: ToolLocator,
}

impl JstackDumper {
    pub fn new() -> Self {
        let mut dirs = Vec::new();
        if let Some(java_home) = std::env::var_os("JAVA_HOME") {
            dirs.push(PathBuf::from(java_home).join("bin"));
        }
        dirs.push(PathBuf::from("/usr/bin"));
        Self::with_locator(ToolLocator::new("jstack", dirs))
    }

    pub fn with_locator(locator: ToolLocator) -> Self {
        Self { locator }
    }

    pub fn build_args(target: &ProcessRecord) -> Vec<String> {
        vec!["-l".to_string(), target.pid.to_string()]
    }
}

impl Default for JstackDumper {
    fn default() -> Self {
        Self::new()
    }
}

impl Dumper for JstackDumper {
    fn name(&self) -> &str {
        self.locator.program()
    }

    fn locate(&self) -> Option<PathBuf> {
        self.locator.resolve()
    }

    fn dump_info(
        &self,
        target: &ProcessRecord,
        _take_dump: bool,
        sink: &mut dyn LogSink,
    ) -> Result<Outcome, DumperError> {
        let Some(jstack) = self.locate() else {
            let reason = not_found(self.name(), target);
            warn!("{}", reason);
            return Ok(Outcome::skipped(reason));
        };

        info!(
            "Debugger {}, analyzing {} process with PID {}",
            jstack.display(),
            target.name,
            target.pid
        );

        run_streaming(&jstack, &Self::build_args(target), sink)?;

        info!("Done analyzing {} process with PID {}", target.name, target.pid);
        Ok(Outcome::Completed { dump_file: None })
    }
}

/// Stand-in where no jstack equivalent is driven (Windows).
pub struct JstackUnsupported;

impl Dumper for JstackUnsupported {
    fn name(&self) -> &str {
        "jstack"
    }

    fn locate(&self) -> Option<PathBuf> {
        None
    }

    fn dump_info(
        &self,
        target: &ProcessRecord,
        _take_dump: bool,
        _sink: &mut dyn LogSink,
    ) -> Result<Outcome, DumperError> {
        let reason = format!(
            "Debugger jstack not supported, skipping dumping of {}",
            target.pid
        );
        warn!("{}", reason);
        Ok(Outcome::skipped(reason))
    }
}
