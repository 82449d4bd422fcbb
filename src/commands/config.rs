//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use hang_analyzer::cli::ConfigFormat;
use hang_analyzer::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::with_defaults();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(match format {
            ConfigFormat::Yaml => "hang-analyzer.yaml",
            ConfigFormat::Json => "hang-analyzer.json",
            ConfigFormat::Toml => "hang-analyzer.toml",
        }),
    };

    let mut content = render_config(&config, format)?;
    if commented {
        if let ConfigFormat::Yaml | ConfigFormat::Toml = format {
            content = add_config_comments(content);
        }
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Prepends a commented reference of every setting.
fn add_config_comments(body: String) -> String {
    let comments = r#"# Hang Analyzer Configuration
# ===========================
#
# Process Selection
# -----------------
# process_ids: null              # Explicit pids; when set, names are ignored
# process_names: [mongo, mongod, mongos, _test, dbtest, python, java]
# go_process_names: null         # Matched like process_names, aborted at the end
# process_match: contains        # exact | contains
#
# Dumps
# -----
# dump_core: false               # Write a core dump for each native process
# max_core_dumps_size_mb: 10000  # Stop dumping once existing dumps reach this size
#
# Debuggers
# ---------
# debugger_output: [stdout]      # stdout and/or file (debugger_<name>.<pid>.log)
# gdb_extensions_dir: null       # Directory with mongo.py, mongo_printers.py, mongo_lock.py
# settle_seconds: 5              # Wait after signalling a process
# debug_symbols_archive: mongo-debugsymbols.tgz
#
# Classification
# --------------
# self_reporting_prefixes: [python]  # Signalled to report their own state
# jvm_prefixes: [java]               # Dumped with jstack
#
# Logging
# -------
# log_level: info                # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{body}")
}
