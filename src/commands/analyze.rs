//! Default action: one full hang-analysis pass.

use anyhow::{anyhow, Context};
use tracing::info;

use hang_analyzer::config::Config;
use hang_analyzer::dispatch::{Backends, DispatchLoop};
use hang_analyzer::platform::Platform;
use hang_analyzer::process::ProcessRecord;
use hang_analyzer::sink::{LogSink, ProcessLogger};

/// Runs the analysis and returns the process exit code.
pub fn command_analyze(config: &Config) -> Result<i32, Box<dyn std::error::Error>> {
    let platform = Platform::current()
        .ok_or_else(|| anyhow!("Unsupported platform {}", std::env::consts::OS))?;
    let work_dir = std::env::current_dir().context("Cannot determine working directory")?;

    let options = config.dispatch_options(&work_dir, std::process::id())?;
    let backends = Backends::for_platform(platform, &config.dumper_settings(), config.settle());
    let outputs = config.debugger_outputs();

    info!("Analyzing processes on {}", platform);

    let run = DispatchLoop::new(
        backends,
        options,
        Box::new(move |target: &ProcessRecord| {
            Box::new(ProcessLogger::new(&outputs, target)) as Box<dyn LogSink>
        }),
    );
    let report = run.run().context("Unable to list processes")?;

    Ok(report.exit_code())
}
