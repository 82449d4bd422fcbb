//! Check-tools command implementation.
//!
//! Reports which of the external tools a run depends on resolve on this host.

use hang_analyzer::config::Config;
use hang_analyzer::dumper::{jvm_dumper_for, native_dumper_for};
use hang_analyzer::invoke::find_program;
use hang_analyzer::platform::Platform;
use std::path::PathBuf;

fn lister_tool(platform: Platform) -> (&'static str, Vec<PathBuf>) {
    match platform {
        Platform::Windows => {
            let dirs = std::env::var("WINDIR")
                .map(|w| vec![PathBuf::from(w).join("system32")])
                .unwrap_or_default();
            ("tasklist.exe", dirs)
        }
        Platform::Darwin => ("ps", vec![PathBuf::from("/bin")]),
        Platform::Linux | Platform::Solaris => {
            ("ps", vec![PathBuf::from("/bin"), PathBuf::from("/usr/bin")])
        }
    }
}

fn report(role: &str, tool: &str, found: Option<PathBuf>) -> bool {
    match found {
        Some(path) => {
            println!("   [ok]      {:<16} {:<12} {}", role, tool, path.display());
            true
        }
        None => {
            println!("   [missing] {:<16} {}", role, tool);
            false
        }
    }
}

/// Prints the resolution of every tool and fails if the process lister is missing.
pub fn command_check_tools(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let platform = Platform::current()
        .ok_or_else(|| format!("Unsupported platform {}", std::env::consts::OS))?;

    println!("Hang Analyzer - Tool Check ({})", platform);
    println!("==================================");

    let (ps, dirs) = lister_tool(platform);
    let lister_ok = report("process lister", ps, find_program(ps, &dirs));

    let native = native_dumper_for(platform, &config.dumper_settings());
    report("native debugger", native.name(), native.locate());

    let jvm = jvm_dumper_for(platform);
    report("jvm dumper", jvm.name(), jvm.locate());

    match native.dump_ext() {
        Some(ext) => println!("\nCore dumps are written as *.{}", ext),
        None => println!("\nCore dumps are not supported"),
    }
    if platform.has_posix_signals() {
        println!("Notifications use SIGUSR1 (report) and SIGABRT (abort)");
    } else {
        println!("Notifications use named events (report) and TerminateProcess (abort)");
    }

    if let Some(dir) = &config.gdb_extensions_dir {
        for script in ["mongo.py", "mongo_printers.py", "mongo_lock.py"] {
            let path = dir.join(script);
            report("gdb extension", script, path.exists().then_some(path));
        }
    }

    if !lister_ok {
        return Err(format!("{} not found; processes cannot be listed", ps).into());
    }
    Ok(())
}
