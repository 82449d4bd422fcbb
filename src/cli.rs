//! CLI arguments and subcommands for hang-analyzer.
//!
//! Without a subcommand the tool runs a full hang-analysis pass over the
//! matching processes. Flags given here override the config file.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::process::MatchMode;
use crate::sink::DebuggerOutput;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// Output format of the `list` subcommand
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListFormat {
    Text,
    Json,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "hang-analyzer",
    about = "Collect stack traces and core dumps from hung test processes",
    long_about = "Collect stack traces and core dumps from hung test processes.\n\n\
                  Finds interesting processes by pid or name, asks cooperative runtimes to \
                  report their own state, attaches the platform debugger to native processes, \
                  dumps JVM threads and finally aborts Go processes so they print their stacks.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Type of match for process names
    #[arg(short = 'm', long, value_enum)]
    pub process_match: Option<MatchMode>,

    /// Comma separated list of process names to analyze
    #[arg(short = 'p', long)]
    pub process_names: Option<String>,

    /// Comma separated list of go process names to analyze
    #[arg(short = 'g', long)]
    pub go_process_names: Option<String>,

    /// Comma separated list of process ids (PID) to analyze, overrides -p & -g
    #[arg(short = 'd', long)]
    pub process_ids: Option<String>,

    /// Dump core file for each analyzed process
    #[arg(short = 'c', long)]
    pub dump_core: bool,

    /// Maximum total size of core dumps to keep in megabytes
    #[arg(short = 's', long = "max-core-dumps-size")]
    pub max_core_dumps_size: Option<u64>,

    /// Where debugger output goes; repeat to use both
    #[arg(short = 'o', long)]
    pub debugger_output: Vec<DebuggerOutput>,

    /// Directory holding the gdb python extensions (mongo.py, mongo_printers.py, mongo_lock.py)
    #[arg(long)]
    pub gdb_extensions_dir: Option<PathBuf>,

    /// Seconds to wait after notifying a process
    #[arg(long)]
    pub settle_seconds: Option<u64>,

    /// Log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the processes a run would analyze, without attaching
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: ListFormat,

        /// List every running process, not only matches
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Report which external tools resolve on this host
    CheckTools,
}
