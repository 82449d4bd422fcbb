//! hang-analyzer
//!
//! Collects stack traces, core dumps and self-reported state from hung test
//! processes. This is the entry point that resolves configuration, sets up
//! logging and dispatches to the default analysis pass or a subcommand.

mod commands;
mod startup_checks;

use clap::Parser;
use tracing::{error, info, Level};

use commands::{command_analyze, command_check_tools, command_config, command_list};
use hang_analyzer::cli::{Args, Commands, LogLevel};
use hang_analyzer::config::{resolve_config, show_config, validate_effective_config, Config};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level = config.log_level.unwrap_or(LogLevel::Info);
    let max_level = match level {
        LogLevel::Off => return,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Config generation doesn't need a valid effective config
    if let Some(Commands::Config {
        output,
        format,
        commented,
    }) = &args.command
    {
        return command_config(output.clone(), *format, *commented);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config);

    match &args.command {
        Some(Commands::List { format, all }) => command_list(*format, *all, &config),
        Some(Commands::CheckTools) => command_check_tools(&config),
        Some(Commands::Config { .. }) => unreachable!("Config handled above"),
        None => {
            startup_checks::log_system_info();
            startup_checks::check_user_privileges();

            match command_analyze(&config) {
                Ok(code) => std::process::exit(code),
                Err(e) => {
                    error!("{}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
