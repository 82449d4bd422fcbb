//! Hang Analyzer Library
//!
//! Collects diagnostic information from hung test processes: stack traces of
//! every thread, optional core dumps, lock and wait-graph information from
//! debugger extensions, and self-reported state from cooperative runtimes.
//!
//! A run is a single pass of [`dispatch::DispatchLoop`]: list processes, match
//! the interesting ones, notify self-reporting runtimes, attach the platform's
//! native debugger, dump JVM threads, abort Go processes, then report. A failure
//! on one process never stops the others; failures are collected in a
//! [`report::ExecutionReport`] that decides the exit code.
//!
//! # Usage
//!
//! ```no_run
//! use hang_analyzer::config::Config;
//! use hang_analyzer::dispatch::{Backends, DispatchLoop};
//! use hang_analyzer::platform::Platform;
//! use hang_analyzer::process::ProcessRecord;
//! use hang_analyzer::sink::{LogSink, ProcessLogger};
//!
//! let config = Config::default();
//! let platform = Platform::current().expect("supported platform");
//! let work_dir = std::env::current_dir().unwrap();
//! let options = config.dispatch_options(&work_dir, std::process::id()).unwrap();
//! let backends = Backends::for_platform(platform, &config.dumper_settings(), config.settle());
//! let outputs = config.debugger_outputs();
//!
//! let run = DispatchLoop::new(
//!     backends,
//!     options,
//!     Box::new(move |p: &ProcessRecord| Box::new(ProcessLogger::new(&outputs, p)) as Box<dyn LogSink>),
//! );
//! let report = run.run().unwrap();
//! std::process::exit(report.exit_code());
//! ```

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod dumper;
pub mod invoke;
pub mod platform;
pub mod process;
pub mod quota;
pub mod report;
pub mod signal;
pub mod sink;
pub mod symbols;

// Re-export main types for convenience
pub use config::Config;
pub use dispatch::{Backends, DispatchLoop, DispatchOptions};
pub use report::{ExecutionReport, FailureRecord};
