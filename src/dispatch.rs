//! The hang-analysis pass.
//!
//! Stages run strictly in order and never backtrack:
//!
//! 1. extract pre-staged debug symbols (best-effort)
//! 2. list and match processes (the only fatal stage)
//! 3. notify self-reporting runtimes, before anything attaches to them
//! 4. attach the native debugger to every native process
//! 5. dump every JVM process
//! 6. abort Go processes; destructive, so always last
//! 7. report
//!
//! A failing process is recorded in the [`ExecutionReport`] and the loop moves
//! on; one broken target never hides the others.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::dumper::{jvm_dumper_for, native_dumper_for, Dumper, DumperSettings};
use crate::platform::Platform;
use crate::process::{
    lister_for, match_processes, Category, Classifier, ListError, MatchSpec, ProcessLister,
    ProcessRecord,
};
use crate::quota::QuotaGuard;
use crate::report::{ExecutionReport, Stage};
use crate::signal::{Notification, OsSignaller, Signaller};
use crate::sink::LogSink;
use crate::symbols::extract_debug_symbols;

/// Creates the output sink for one diagnosed process.
pub type SinkFactory = Box<dyn Fn(&ProcessRecord) -> Box<dyn LogSink>>;

/// The OS-specific collaborators of a run.
pub struct Backends {
    pub lister: Box<dyn ProcessLister>,
    pub native: Box<dyn Dumper>,
    pub jvm: Box<dyn Dumper>,
    pub signaller: Box<dyn Signaller>,
}

impl Backends {
    pub fn for_platform(platform: Platform, settings: &DumperSettings, settle: Duration) -> Self {
        Self {
            lister: lister_for(platform),
            native: native_dumper_for(platform, settings),
            jvm: jvm_dumper_for(platform),
            signaller: Box::new(OsSignaller::new(settle)),
        }
    }
}

/// Everything the loop needs besides the backends.
pub struct DispatchOptions {
    pub match_spec: MatchSpec,
    pub classifier: Classifier,
    pub dump_core: bool,
    pub quota: QuotaGuard,
    /// Debug-symbol archive to unpack first, if any.
    pub symbols_archive: Option<PathBuf>,
    /// Directory symbols are unpacked into; also where dumps land.
    pub work_dir: PathBuf,
    /// Never diagnosed, whatever the match spec says.
    pub self_pid: u32,
}

pub struct DispatchLoop {
    backends: Backends,
    options: DispatchOptions,
    make_sink: SinkFactory,
}

impl DispatchLoop {
    pub fn new(backends: Backends, options: DispatchOptions, make_sink: SinkFactory) -> Self {
        Self {
            backends,
            options,
            make_sink,
        }
    }

    /// Runs all stages. Only a failure to list processes is returned as an error.
    pub fn run(&self) -> Result<ExecutionReport, ListError> {
        if let Some(archive) = &self.options.symbols_archive {
            extract_debug_symbols(archive, &self.options.work_dir);
        }

        let processes = self.discover()?;
        let mut report = ExecutionReport::new();

        let classifier = &self.options.classifier;
        let in_category = |category: Category| {
            processes
                .iter()
                .filter(move |p| classifier.category(p) == category)
        };

        // Python processes write report.json when signalled, so this goes first.
        for target in in_category(Category::SelfReporting) {
            self.notify(target, Notification::Report);
        }

        for target in in_category(Category::Native) {
            let take_dump = self.take_dump();
            self.diagnose(
                self.backends.native.as_ref(),
                Stage::NativeDebugger,
                target,
                take_dump,
                &mut report,
            );
        }

        for target in in_category(Category::Jvm) {
            self.diagnose(
                self.backends.jvm.as_ref(),
                Stage::JvmStackDump,
                target,
                false,
                &mut report,
            );
        }

        // Go processes print their stacks and die on SIGABRT; stacks may be
        // captured elsewhere (e.g. by resmoke).
        for target in processes
            .iter()
            .filter(|p| classifier.aborts_after_diagnosis(p))
        {
            self.notify(target, Notification::Abort);
        }

        info!("Done analyzing all processes for hangs");

        for failure in report.failures() {
            error!("{}", failure);
        }
        if !report.is_success() {
            error!("{} process(es) failed analysis", report.failures().len());
        }

        Ok(report)
    }

    fn discover(&self) -> Result<Vec<ProcessRecord>, ListError> {
        let all = self.backends.lister.list()?;
        let matched = match_processes(&all, &self.options.match_spec, self.options.self_pid);

        if !matched.missing_pids.is_empty() {
            warn!(
                "The following requested process ids are not running {:?}",
                matched.missing_pids
            );
        }

        let summary: Vec<String> = matched.processes.iter().map(|p| p.to_string()).collect();
        info!(
            "Found {} interesting processes [{}]",
            matched.processes.len(),
            summary.join(", ")
        );
        Ok(matched.processes)
    }

    /// Dump decision for the next native attach; re-reads the directory each time.
    fn take_dump(&self) -> bool {
        if !self.options.dump_core {
            return false;
        }
        let Some(ext) = self.backends.native.dump_ext() else {
            return false;
        };
        match self.options.quota.within_budget(ext) {
            Ok(true) => true,
            Ok(false) => {
                warn!(
                    "Dump quota of {} bytes for *.{} files exceeded, skipping core dump",
                    self.options.quota.budget_bytes(),
                    ext
                );
                false
            }
            Err(e) => {
                warn!("Cannot check dump quota, skipping core dump: {}", e);
                false
            }
        }
    }

    fn diagnose(
        &self,
        dumper: &dyn Dumper,
        stage: Stage,
        target: &ProcessRecord,
        take_dump: bool,
        report: &mut ExecutionReport,
    ) {
        let mut sink = (self.make_sink)(target);
        match dumper.dump_info(target, take_dump, sink.as_mut()) {
            Ok(outcome) => debug!("{} {}: {}", dumper.name(), target, outcome.diagnostic()),
            Err(e) => {
                error!("Error encountered when invoking debugger {}", e);
                report.record(target, stage, e.to_string());
            }
        }
    }

    fn notify(&self, target: &ProcessRecord, notification: Notification) {
        info!(
            "Sending {} to {} process {} with PID {}",
            notification,
            match notification {
                Notification::Report => "self-reporting",
                Notification::Abort => "go",
            },
            target.name,
            target.pid
        );
        if let Err(e) = self.backends.signaller.notify(target, notification) {
            warn!("{}", e);
        }
    }
}
