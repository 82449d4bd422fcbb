//! List command implementation.
//!
//! Shows which processes a run would touch, and how, without attaching to
//! or signalling anything.

use anyhow::Context;
use serde::Serialize;

use hang_analyzer::cli::ListFormat;
use hang_analyzer::config::Config;
use hang_analyzer::process::{current_lister, match_processes, Category, Classifier, ProcessRecord};

#[derive(Debug, Serialize)]
struct ListedProcess<'a> {
    pid: u32,
    name: &'a str,
    category: Category,
    aborts: bool,
}

fn describe<'a>(classifier: &Classifier, p: &'a ProcessRecord) -> ListedProcess<'a> {
    ListedProcess {
        pid: p.pid,
        name: &p.name,
        category: classifier.category(p),
        aborts: classifier.aborts_after_diagnosis(p),
    }
}

/// Lists matched (or, with `all`, every) running process.
pub fn command_list(
    format: ListFormat,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let lister = current_lister()?;
    let processes = lister.list().context("Unable to list processes")?;
    let classifier = config.classifier()?;

    let (shown, missing) = if all {
        (processes, Default::default())
    } else {
        let matched = match_processes(&processes, &config.match_spec(), std::process::id());
        (matched.processes, matched.missing_pids)
    };

    let rows: Vec<ListedProcess> = shown.iter().map(|p| describe(&classifier, p)).collect();

    match format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        ListFormat::Text => {
            for row in &rows {
                println!(
                    "{:>8}  {:<16} {}{}",
                    row.pid,
                    format!("{:?}", row.category),
                    row.name,
                    if row.aborts { "  (abort)" } else { "" }
                );
            }
            println!("\n{} process(es)", rows.len());
            if !missing.is_empty() {
                println!("Not running: {:?}", missing);
            }
        }
    }

    Ok(())
}
