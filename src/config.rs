//! Configuration management for hang-analyzer.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats. Every field is
//! optional; the accessors on [`Config`] apply the built-in defaults.

use crate::cli::{Args, ConfigFormat, LogLevel};
use crate::dispatch::DispatchOptions;
use crate::dumper::DumperSettings;
use crate::process::{Classifier, MatchMode, MatchSpec};
use crate::quota::QuotaGuard;
use crate::signal::DEFAULT_SETTLE;
use crate::sink::DebuggerOutput;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_PROCESS_NAMES: &[&str] =
    &["mongo", "mongod", "mongos", "_test", "dbtest", "python", "java"];
pub const DEFAULT_MAX_CORE_DUMPS_SIZE_MB: u64 = 10_000;
pub const DEFAULT_DEBUG_SYMBOLS_ARCHIVE: &str = "mongo-debugsymbols.tgz";
pub const DEFAULT_SELF_REPORTING_PREFIXES: &[&str] = &["python"];
pub const DEFAULT_JVM_PREFIXES: &[&str] = &["java"];

const DEFAULT_LOCATIONS: [&str; 6] = [
    "/etc/hang-analyzer/hang-analyzer.yaml",
    "/etc/hang-analyzer/hang-analyzer.yml",
    "/etc/hang-analyzer/hang-analyzer.json",
    "./hang-analyzer.yaml",
    "./hang-analyzer.yml",
    "./hang-analyzer.json",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid process id '{0}'")]
    InvalidPid(String),

    #[error("Invalid process prefix pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Hang-analyzer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Process selection
    #[serde(alias = "process-ids")]
    pub process_ids: Option<Vec<u32>>,
    #[serde(alias = "process-names")]
    pub process_names: Option<Vec<String>>,
    /// Matched like process_names; these also receive SIGABRT at the end.
    #[serde(alias = "go-process-names")]
    pub go_process_names: Option<Vec<String>>,
    #[serde(alias = "process-match")]
    pub process_match: Option<MatchMode>,

    // Dumps
    #[serde(alias = "dump-core")]
    pub dump_core: Option<bool>,
    #[serde(alias = "max-core-dumps-size-mb")]
    pub max_core_dumps_size_mb: Option<u64>,

    // Debugger backends
    #[serde(alias = "debugger-output")]
    pub debugger_output: Option<Vec<DebuggerOutput>>,
    #[serde(alias = "gdb-extensions-dir")]
    pub gdb_extensions_dir: Option<PathBuf>,
    #[serde(alias = "settle-seconds")]
    pub settle_seconds: Option<u64>,
    #[serde(alias = "debug-symbols-archive")]
    pub debug_symbols_archive: Option<PathBuf>,

    // Classification
    #[serde(alias = "self-reporting-prefixes")]
    pub self_reporting_prefixes: Option<Vec<String>>,
    #[serde(alias = "jvm-prefixes")]
    pub jvm_prefixes: Option<Vec<String>>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<LogLevel>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Config with every default spelled out, as written by `config`.
    pub fn with_defaults() -> Self {
        Self {
            process_ids: None,
            process_names: Some(owned(DEFAULT_PROCESS_NAMES)),
            go_process_names: None,
            process_match: Some(MatchMode::default()),
            dump_core: Some(false),
            max_core_dumps_size_mb: Some(DEFAULT_MAX_CORE_DUMPS_SIZE_MB),
            debugger_output: Some(vec![DebuggerOutput::Stdout]),
            gdb_extensions_dir: None,
            settle_seconds: Some(DEFAULT_SETTLE.as_secs()),
            debug_symbols_archive: Some(PathBuf::from(DEFAULT_DEBUG_SYMBOLS_ARCHIVE)),
            self_reporting_prefixes: Some(owned(DEFAULT_SELF_REPORTING_PREFIXES)),
            jvm_prefixes: Some(owned(DEFAULT_JVM_PREFIXES)),
            log_level: Some(LogLevel::Info),
        }
    }

    pub fn process_match(&self) -> MatchMode {
        self.process_match.unwrap_or_default()
    }

    /// process_names followed by go_process_names.
    pub fn name_patterns(&self) -> Vec<String> {
        let mut names = self
            .process_names
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_PROCESS_NAMES));
        names.extend(self.go_process_names.iter().flatten().cloned());
        names
    }

    pub fn match_spec(&self) -> MatchSpec {
        MatchSpec::from_parts(
            self.process_ids.as_deref().unwrap_or_default(),
            &self.name_patterns(),
            self.process_match(),
        )
    }

    pub fn classifier(&self) -> Result<Classifier, ConfigError> {
        let self_reporting = self
            .self_reporting_prefixes
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_SELF_REPORTING_PREFIXES));
        let jvm = self
            .jvm_prefixes
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_JVM_PREFIXES));
        let abort = self.go_process_names.clone().unwrap_or_default();
        Ok(Classifier::new(&self_reporting, &jvm, &abort)?)
    }

    pub fn debugger_outputs(&self) -> Vec<DebuggerOutput> {
        self.debugger_output
            .clone()
            .unwrap_or_else(|| vec![DebuggerOutput::Stdout])
    }

    pub fn settle(&self) -> Duration {
        self.settle_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SETTLE)
    }

    pub fn dumper_settings(&self) -> DumperSettings {
        DumperSettings {
            gdb_extensions_dir: self.gdb_extensions_dir.clone(),
        }
    }

    /// Builds the dispatch options for a run rooted at `work_dir`.
    pub fn dispatch_options(
        &self,
        work_dir: &Path,
        self_pid: u32,
    ) -> Result<DispatchOptions, ConfigError> {
        let archive = self
            .debug_symbols_archive
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEBUG_SYMBOLS_ARCHIVE));

        Ok(DispatchOptions {
            match_spec: self.match_spec(),
            classifier: self.classifier()?,
            dump_core: self.dump_core.unwrap_or(false),
            quota: QuotaGuard::from_megabytes(
                work_dir,
                self.max_core_dumps_size_mb
                    .unwrap_or(DEFAULT_MAX_CORE_DUMPS_SIZE_MB),
            ),
            symbols_archive: Some(work_dir.join(archive)),
            work_dir: work_dir.to_path_buf(),
            self_pid,
        })
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.debugger_output.as_ref().is_some_and(|v| v.is_empty()) {
        return Err(ConfigError::Invalid(
            "debugger_output must name at least one of 'stdout' or 'file'".into(),
        ));
    }

    if cfg.max_core_dumps_size_mb == Some(0) {
        return Err(ConfigError::Invalid(
            "max_core_dumps_size_mb must be greater than 0".into(),
        ));
    }

    for (field, prefixes) in [
        ("self_reporting_prefixes", &cfg.self_reporting_prefixes),
        ("jvm_prefixes", &cfg.jvm_prefixes),
    ] {
        if let Some(prefixes) = prefixes {
            if prefixes.is_empty() || prefixes.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "{} must contain only non-empty prefixes",
                    field
                )));
            }
        }
    }

    let has_pids = cfg.process_ids.as_ref().is_some_and(|v| !v.is_empty());
    let has_names = cfg.name_patterns().iter().any(|n| !n.trim().is_empty());
    if !has_pids && !has_names {
        return Err(ConfigError::Invalid(
            "No process ids or process names to analyze".into(),
        ));
    }

    cfg.classifier()?;
    Ok(())
}

/// Splits a comma-separated CLI list, dropping empty entries.
fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses `-d 12,34`.
pub fn parse_pid_list(s: &str) -> Result<Vec<u32>, ConfigError> {
    split_list(s)
        .into_iter()
        .map(|p| p.parse::<u32>().map_err(|_| ConfigError::InvalidPid(p)))
        .collect()
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(ids) = &args.process_ids {
        config.process_ids = Some(parse_pid_list(ids)?);
    }
    if let Some(names) = &args.process_names {
        config.process_names = Some(split_list(names));
    }
    if let Some(names) = &args.go_process_names {
        config.go_process_names = Some(split_list(names));
    }
    if let Some(mode) = args.process_match {
        config.process_match = Some(mode);
    }

    if args.dump_core {
        config.dump_core = Some(true);
    }
    if let Some(mb) = args.max_core_dumps_size {
        config.max_core_dumps_size_mb = Some(mb);
    }

    if !args.debugger_output.is_empty() {
        config.debugger_output = Some(args.debugger_output.clone());
    }
    if let Some(dir) = &args.gdb_extensions_dir {
        config.gdb_extensions_dir = Some(dir.clone());
    }
    if let Some(secs) = args.settle_seconds {
        config.settle_seconds = Some(secs);
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(level);
    }

    Ok(config)
}

/// Loads the config at `path`, or the first default location that exists.
///
/// Without an explicit path and with no file at any default location the
/// (all-`None`) default config is returned.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_LOCATIONS.iter().copied().map(Path::new).find(|p| p.exists()) {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.clone(),
            source,
        })?,
        Some("toml") => toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.clone(),
            source,
        })?,
        // Default to YAML
        _ => serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.clone(),
            source,
        })?,
    };

    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Renders a config in the requested format.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
