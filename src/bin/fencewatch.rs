//! fencewatch CLI
//!
//! Runs one monitor cycle over a JSON scenario file and prints the cycle
//! summary and any new events as JSON.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fencewatch::storage::{AlertSink, FenceStore, InMemoryStores, PositionSource};
use fencewatch::{EventId, FenceEvent, FenceMonitor, FenceResult, MonitorConfig, RunSummary, Scenario, StorageError};

/// CLI options
struct Args {
    /// Scenario file to evaluate
    scenario: PathBuf,
    /// Optional monitor config file
    config: Option<PathBuf>,
    /// Write the updated event log back into the scenario file
    write_events: bool,
}

fn print_help() {
    println!("fencewatch - geofence monitoring engine");
    println!();
    println!("USAGE:");
    println!("    fencewatch --scenario <FILE> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -s, --scenario <FILE>     Scenario JSON with fences, positions and events");
    println!("    -c, --config <FILE>       Monitor config JSON [default: built-in defaults]");
    println!("    -w, --write-events        Write the updated event log back to the scenario");
    println!("    -h, --help                Print help information");
    println!();
    println!("Log verbosity is controlled with RUST_LOG [default: info].");
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut scenario = None;
    let mut config = None;
    let mut write_events = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" | "-s" => {
                if i + 1 < args.len() {
                    scenario = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("error: --scenario requires a value");
                    std::process::exit(1);
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("error: --config requires a value");
                    std::process::exit(1);
                }
            }
            "--write-events" | "-w" => {
                write_events = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                eprintln!("error: unknown argument: {other}");
                eprintln!("Run with --help for usage.");
                std::process::exit(1);
            }
        }
    }

    let Some(scenario) = scenario else {
        eprintln!("error: --scenario is required");
        std::process::exit(1);
    };

    Args {
        scenario,
        config,
        write_events,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    summary: RunSummary,
    unreadable_fences: usize,
    new_events: Vec<FenceEvent>,
}

fn run(args: &Args) -> FenceResult<Report> {
    let config = match &args.config {
        Some(path) => MonitorConfig::from_path(path)?,
        None => MonitorConfig::default(),
    };

    let mut scenario = Scenario::from_path(&args.scenario)?;
    let known: HashSet<EventId> = scenario.events.iter().map(|e| e.id).collect();
    let (stores, loaded) = scenario.clone().into_stores()?;

    let InMemoryStores {
        positions,
        fences,
        alerts,
    } = stores;
    let alerts = Arc::new(alerts);

    let monitor = FenceMonitor::new(
        Arc::new(positions) as Arc<dyn PositionSource>,
        Arc::new(fences) as Arc<dyn FenceStore>,
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
        &config,
    )?;
    let summary = monitor.run_once()?;
    drop(monitor);

    let all_events = alerts.all_events()?;
    let new_events: Vec<FenceEvent> = all_events.iter().filter(|e| !known.contains(&e.id)).cloned().collect();

    if args.write_events {
        scenario.events = all_events;
        scenario.write_to(&args.scenario)?;
        info!(path = %args.scenario.display(), events = scenario.events.len(), "event log written");
    }

    Ok(Report {
        summary,
        unreadable_fences: loaded.unreadable_fences,
        new_events,
    })
}

fn main() -> ExitCode {
    let args = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!(scenario = %args.scenario.display(), "starting fencewatch cycle");

    let report = match run(&args) {
        Ok(report) => report,
        Err(err) => {
            error!(error = %err, "cycle failed");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %StorageError::SerializationError(err.to_string()), "failed to print report");
            ExitCode::FAILURE
        }
    }
}
