//! Dispatch loop behaviour with scripted backends.
//!
//! The fakes share one event log so tests can assert on stage order as well
//! as on which processes were touched.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use hang_analyzer::dispatch::{Backends, DispatchLoop, DispatchOptions};
use hang_analyzer::dumper::{Dumper, DumperError, Outcome};
use hang_analyzer::invoke::InvokeError;
use hang_analyzer::process::{Classifier, ListError, MatchMode, MatchSpec, ProcessLister, ProcessRecord};
use hang_analyzer::quota::QuotaGuard;
use hang_analyzer::report::Stage;
use hang_analyzer::signal::{Notification, SignalError, Signaller};
use hang_analyzer::sink::{LogSink, MemorySink};
use tempfile::{tempdir, TempDir};

type Events = Rc<RefCell<Vec<String>>>;

struct FakeLister {
    result: Result<Vec<ProcessRecord>, ()>,
}

impl ProcessLister for FakeLister {
    fn list(&self) -> Result<Vec<ProcessRecord>, ListError> {
        self.result
            .clone()
            .map_err(|_| ListError::ToolNotFound("ps".to_string()))
    }
}

struct FakeDumper {
    label: &'static str,
    ext: Option<&'static str>,
    failing: BTreeSet<u32>,
    skipping: BTreeSet<u32>,
    /// Bytes written as a dump when asked for one.
    dump_size: u64,
    dir: PathBuf,
    events: Events,
}

impl Dumper for FakeDumper {
    fn name(&self) -> &str {
        self.label
    }

    fn dump_ext(&self) -> Option<&'static str> {
        self.ext
    }

    fn locate(&self) -> Option<PathBuf> {
        Some(PathBuf::from(self.label))
    }

    fn dump_info(
        &self,
        target: &ProcessRecord,
        take_dump: bool,
        sink: &mut dyn LogSink,
    ) -> Result<Outcome, DumperError> {
        self.events
            .borrow_mut()
            .push(format!("{}:{}:{}", self.label, target.pid, take_dump));
        sink.line(&format!("attached to {}", target.pid));

        if self.failing.contains(&target.pid) {
            return Err(DumperError::Invoke(InvokeError::BadExitCode {
                code: 1,
                command: format!("{} {}", self.label, target.pid),
            }));
        }
        if self.skipping.contains(&target.pid) {
            return Ok(Outcome::skipped("not available"));
        }

        let dump_file = match (take_dump, self.ext) {
            (true, Some(ext)) => {
                let path = self.dir.join(format!("dump_{}.{}.{}", target.base_name(), target.pid, ext));
                File::create(&path)
                    .and_then(|f| f.set_len(self.dump_size))
                    .map_err(DumperError::Script)?;
                Some(path)
            }
            _ => None,
        };
        Ok(Outcome::Completed { dump_file })
    }
}

struct FakeSignaller {
    events: Events,
    failing: BTreeSet<u32>,
}

impl Signaller for FakeSignaller {
    fn notify(&self, target: &ProcessRecord, notification: Notification) -> Result<(), SignalError> {
        let kind = match notification {
            Notification::Report => "report",
            Notification::Abort => "abort",
        };
        self.events
            .borrow_mut()
            .push(format!("{}:{}", kind, target.pid));
        if self.failing.contains(&target.pid) {
            return Err(SignalError::NoSuchProcess(target.pid));
        }
        Ok(())
    }
}

struct Harness {
    events: Events,
    sinks: Rc<RefCell<Vec<(u32, Rc<RefCell<MemorySink>>)>>>,
    dir: TempDir,
}

/// Shares a `MemorySink` between the loop and the test.
struct SharedSink(Rc<RefCell<MemorySink>>);

impl LogSink for SharedSink {
    fn line(&mut self, line: &str) {
        self.0.borrow_mut().line(line);
    }
}

#[derive(Default)]
struct Setup {
    processes: Vec<(u32, &'static str)>,
    pids: Vec<u32>,
    names: Vec<&'static str>,
    go_names: Vec<&'static str>,
    native_failing: Vec<u32>,
    native_skipping: Vec<u32>,
    jvm_failing: Vec<u32>,
    signal_failing: Vec<u32>,
    dump_core: bool,
    budget_bytes: u64,
    dump_size: u64,
    list_fails: bool,
}

impl Harness {
    fn new() -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
            sinks: Rc::new(RefCell::new(Vec::new())),
            dir: tempdir().unwrap(),
        }
    }

    fn build(&self, setup: Setup) -> DispatchLoop {
        let processes: Vec<ProcessRecord> = setup
            .processes
            .iter()
            .map(|(pid, name)| ProcessRecord::new(*pid, name))
            .collect();
        let lister = FakeLister {
            result: if setup.list_fails { Err(()) } else { Ok(processes) },
        };

        let native = FakeDumper {
            label: "gdb",
            ext: Some("core"),
            failing: setup.native_failing.into_iter().collect(),
            skipping: setup.native_skipping.into_iter().collect(),
            dump_size: setup.dump_size,
            dir: self.dir.path().to_path_buf(),
            events: Rc::clone(&self.events),
        };
        let jvm = FakeDumper {
            label: "jstack",
            ext: None,
            failing: setup.jvm_failing.into_iter().collect(),
            skipping: BTreeSet::new(),
            dump_size: 0,
            dir: self.dir.path().to_path_buf(),
            events: Rc::clone(&self.events),
        };
        let signaller = FakeSignaller {
            events: Rc::clone(&self.events),
            failing: setup.signal_failing.into_iter().collect(),
        };

        let to_strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut names = to_strings(&setup.names);
        names.extend(to_strings(&setup.go_names));

        let options = DispatchOptions {
            match_spec: MatchSpec::from_parts(&setup.pids, &names, MatchMode::Contains),
            classifier: Classifier::new(
                &to_strings(&["python"]),
                &to_strings(&["java"]),
                &to_strings(&setup.go_names),
            )
            .unwrap(),
            dump_core: setup.dump_core,
            quota: QuotaGuard::new(self.dir.path(), setup.budget_bytes),
            symbols_archive: Some(self.dir.path().join("mongo-debugsymbols.tgz")),
            work_dir: self.dir.path().to_path_buf(),
            self_pid: 1,
        };

        let sinks = Rc::clone(&self.sinks);
        DispatchLoop::new(
            Backends {
                lister: Box::new(lister),
                native: Box::new(native),
                jvm: Box::new(jvm),
                signaller: Box::new(signaller),
            },
            options,
            Box::new(move |target: &ProcessRecord| {
                let sink = Rc::new(RefCell::new(MemorySink::new()));
                sinks.borrow_mut().push((target.pid, Rc::clone(&sink)));
                Box::new(SharedSink(sink)) as Box<dyn LogSink>
            }),
        )
    }

    fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[test]
fn test_failures_are_isolated_per_process() {
    let h = Harness::new();
    let run = h.build(Setup {
        processes: vec![(10, "mongod"), (11, "mongod"), (12, "mongos"), (13, "mongo"), (14, "mongod")],
        names: vec!["mongo"],
        native_failing: vec![11, 13],
        ..Setup::default()
    });

    let report = run.run().unwrap();

    assert_eq!(report.failures().len(), 2);
    assert_eq!(report.exit_code(), 1);
    let failed: Vec<u32> = report.failures().iter().map(|f| f.pid).collect();
    assert_eq!(failed, vec![11, 13]);
    assert!(report.failures().iter().all(|f| f.stage == Stage::NativeDebugger));
    assert!(report.failures()[0].message.contains("Bad exit code 1"));

    // Every process was still attempted.
    let attempted: Vec<String> = h.events().into_iter().filter(|e| e.starts_with("gdb:")).collect();
    assert_eq!(attempted.len(), 5);
}

#[test]
fn test_all_succeed_exit_zero() {
    let h = Harness::new();
    let run = h.build(Setup {
        processes: vec![(10, "mongod"), (20, "java")],
        names: vec!["mongod", "java"],
        ..Setup::default()
    });

    let report = run.run().unwrap();

    assert!(report.is_success());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(h.events(), vec!["gdb:10:false", "jstack:20:false"]);
}

#[test]
fn test_skipped_backend_is_not_a_failure() {
    let h = Harness::new();
    let run = h.build(Setup {
        processes: vec![(10, "mongod"), (11, "mongod")],
        names: vec!["mongod"],
        native_skipping: vec![10],
        ..Setup::default()
    });

    let report = run.run().unwrap();
    assert!(report.is_success());
}

#[test]
fn test_stage_order() {
    let h = Harness::new();
    let run = h.build(Setup {
        processes: vec![
            (50, "mongoreplay"),
            (40, "java"),
            (30, "mongod"),
            (20, "python3"),
        ],
        names: vec!["mongod", "python", "java"],
        go_names: vec!["mongoreplay"],
        ..Setup::default()
    });

    run.run().unwrap();

    assert_eq!(
        h.events(),
        vec![
            "report:20",
            "gdb:50:false",
            "gdb:30:false",
            "jstack:40:false",
            "abort:50",
        ]
    );
}

#[test]
fn test_jvm_failure_recorded_with_stage() {
    let h = Harness::new();
    let run = h.build(Setup {
        processes: vec![(40, "java"), (41, "java")],
        names: vec!["java"],
        jvm_failing: vec![41],
        ..Setup::default()
    });

    let report = run.run().unwrap();

    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].pid, 41);
    assert_eq!(report.failures()[0].stage, Stage::JvmStackDump);
}

#[test]
fn test_signal_failures_do_not_fail_the_run() {
    let h = Harness::new();
    let run = h.build(Setup {
        processes: vec![(20, "python3"), (50, "mongoreplay")],
        names: vec!["python"],
        go_names: vec!["mongoreplay"],
        signal_failing: vec![20, 50],
        ..Setup::default()
    });

    let report = run.run().unwrap();

    assert!(report.is_success());
    assert_eq!(h.events(), vec!["report:20", "gdb:50:false", "abort:50"]);
}

#[test]
fn test_listing_failure_is_fatal() {
    let h = Harness::new();
    let run = h.build(Setup {
        names: vec!["mongod"],
        list_fails: true,
        ..Setup::default()
    });

    assert!(run.run().is_err());
    assert!(h.events().is_empty());
}

#[test]
fn test_quota_stops_dumps_once_exceeded() {
    let h = Harness::new();
    let run = h.build(Setup {
        processes: vec![(10, "mongod"), (11, "mongod"), (12, "mongod")],
        names: vec!["mongod"],
        dump_core: true,
        budget_bytes: 150,
        dump_size: 100,
        ..Setup::default()
    });

    let report = run.run().unwrap();

    assert!(report.is_success());
    // 0 bytes used -> dump; 100 used -> dump; 200 used -> over budget.
    assert_eq!(
        h.events(),
        vec!["gdb:10:true", "gdb:11:true", "gdb:12:false"]
    );
    assert!(h.path().join("dump_mongod.11.core").exists());
    assert!(!h.path().join("dump_mongod.12.core").exists());
}

#[test]
fn test_no_dumps_unless_requested() {
    let h = Harness::new();
    let run = h.build(Setup {
        processes: vec![(10, "mongod")],
        names: vec!["mongod"],
        budget_bytes: u64::MAX,
        ..Setup::default()
    });

    run.run().unwrap();
    assert_eq!(h.events(), vec!["gdb:10:false"]);
}

#[test]
fn test_each_process_gets_its_own_sink() {
    let h = Harness::new();
    let run = h.build(Setup {
        processes: vec![(10, "mongod"), (40, "java")],
        names: vec!["mongod", "java"],
        ..Setup::default()
    });

    run.run().unwrap();

    let sinks = h.sinks.borrow();
    assert_eq!(sinks.len(), 2);
    assert_eq!(sinks[0].0, 10);
    assert_eq!(sinks[0].1.borrow().lines, vec!["attached to 10"]);
    assert_eq!(sinks[1].1.borrow().lines, vec!["attached to 40"]);
}

#[test]
fn test_self_is_never_diagnosed() {
    let h = Harness::new();
    let run = h.build(Setup {
        processes: vec![(1, "mongod"), (2, "mongod")],
        pids: vec![1, 2],
        ..Setup::default()
    });

    run.run().unwrap();
    assert_eq!(h.events(), vec!["gdb:2:false"]);
}

#[test]
fn test_io_error_from_dumper_is_recorded() {
    struct Broken;
    impl Dumper for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn locate(&self) -> Option<PathBuf> {
            None
        }
        fn dump_info(
            &self,
            _target: &ProcessRecord,
            _take_dump: bool,
            _sink: &mut dyn LogSink,
        ) -> Result<Outcome, DumperError> {
            Err(DumperError::Script(io::Error::new(io::ErrorKind::Other, "disk full")))
        }
    }

    let h = Harness::new();
    let events = Rc::clone(&h.events);
    let run = DispatchLoop::new(
        Backends {
            lister: Box::new(FakeLister {
                result: Ok(vec![ProcessRecord::new(10, "mongod")]),
            }),
            native: Box::new(Broken),
            jvm: Box::new(Broken),
            signaller: Box::new(FakeSignaller {
                events,
                failing: BTreeSet::new(),
            }),
        },
        DispatchOptions {
            match_spec: MatchSpec::from_parts(&[], &["mongod".to_string()], MatchMode::Exact),
            classifier: Classifier::new(&["python".to_string()], &["java".to_string()], &[]).unwrap(),
            dump_core: false,
            quota: QuotaGuard::new(h.path(), 0),
            symbols_archive: None,
            work_dir: h.path().to_path_buf(),
            self_pid: 1,
        },
        Box::new(|_: &ProcessRecord| Box::new(MemorySink::new()) as Box<dyn LogSink>),
    );

    let report = run.run().unwrap();
    assert_eq!(report.failures().len(), 1);
    assert!(report.failures()[0].message.contains("disk full"));
}
