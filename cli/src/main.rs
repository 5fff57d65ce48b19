//! Interlock: command-line binding of the ticket handshake.
//!
//! Every command prints one JSON document on stdout. Logs go to stderr.
//!
//! Usage:
//!   interlock begin --ticket-id PROJ-42
//!   interlock submit ticket.json          (or `next-step`, or stdin)
//!   interlock show run_1f0c…
//!   interlock verify-log run_1f0c…
//!   interlock schema gather_evidence --example
//!   interlock walkthrough

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use interlock_audit::GLOBAL_SCOPE;
use interlock_config::InterlockConfig;
use interlock_contracts::{
    error::{InterlockError, InterlockResult},
    stage::Stage,
};
use interlock_runtime::{build_runtime, run_walkthrough};
use interlock_schema::{samples::sample_payload, SchemaCatalog};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Interlock: a fail-closed, stage-gated ticket workflow for coding agents.
#[derive(Parser)]
#[command(
    name = "interlock",
    about = "Stage-gated ticket handshake for coding agents",
    long_about = "Issues ticket.json envelopes, validates each stage's payload, and\n\
                  advances, retries, or fails the run closed."
)]
struct Cli {
    /// Path to an interlock TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new run at fetch_ticket.
    Begin {
        #[arg(long)]
        ticket_id: String,
        /// Use this run id instead of generating one.
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Submit a filled-in ticket.json (reads stdin when FILE is omitted or "-").
    #[command(alias = "next-step")]
    Submit { file: Option<PathBuf> },
    /// Print the latest stored envelope of a run.
    Show { run_id: String },
    /// Check the hash chain of a run's event log (the global log by default).
    VerifyLog { run_id: Option<String> },
    /// Print the JSON Schema for a stage's payload (every stage if omitted).
    Schema {
        stage: Option<Stage>,
        /// Print a valid sample payload instead of the schema.
        #[arg(long)]
        example: bool,
    },
    /// Drive one run through every stage against an in-memory store.
    Walkthrough {
        #[arg(long, default_value = "DEMO-1")]
        ticket_id: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("interlock: {}", e);
            std::process::exit(2);
        }
    };

    // RUST_LOG wins over the configured filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    match run(cli.command, &config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("interlock: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> InterlockResult<InterlockConfig> {
    match path {
        Some(path) => InterlockConfig::from_file(path),
        None => Ok(InterlockConfig::default()),
    }
}

// ── Command dispatch ──────────────────────────────────────────────────────────

/// Run one command. `Ok(false)` means the command ran but found a problem
/// worth a non-zero exit (a missing run, a broken chain).
fn run(command: Command, config: &InterlockConfig) -> InterlockResult<bool> {
    match command {
        Command::Begin { ticket_id, run_id } => {
            let runtime = build_runtime(config)?;
            let response = runtime.orchestrator.begin(&ticket_id, run_id.as_deref())?;
            print_json(&response)?;
            Ok(true)
        }

        Command::Submit { file } => {
            let document = read_document(file.as_deref())?;
            let runtime = build_runtime(config)?;
            let response = runtime.orchestrator.submit(&document)?;
            print_json(&response)?;
            Ok(true)
        }

        Command::Show { run_id } => {
            let runtime = build_runtime(config)?;
            match runtime.orchestrator.latest(&run_id)? {
                Some(envelope) => {
                    print_json(&envelope)?;
                    Ok(true)
                }
                None => {
                    eprintln!("interlock: no run with id '{}'", run_id);
                    Ok(false)
                }
            }
        }

        Command::VerifyLog { run_id } => {
            let runtime = build_runtime(config)?;
            let scope = run_id.as_deref().unwrap_or(GLOBAL_SCOPE);
            let intact = runtime.store.verify_scope(scope)?;
            let log = runtime.store.export_log(scope)?;
            print_json(&serde_json::json!({
                "scope": scope,
                "event_count": log.events.len(),
                "terminal_hash": log.terminal_hash,
                "intact": intact,
            }))?;
            Ok(intact)
        }

        Command::Schema { stage, example } => {
            let catalog = SchemaCatalog::standard();
            let render = |stage: Stage| -> Option<Value> {
                if example {
                    catalog.get(stage).map(|_| Value::Object(sample_payload(stage)))
                } else {
                    catalog.get(stage).map(|schema| schema.to_json_schema())
                }
            };
            match stage {
                Some(stage) => match render(stage) {
                    Some(doc) => print_json(&doc)?,
                    None => {
                        eprintln!("interlock: state '{}' has no payload schema", stage);
                        return Ok(false);
                    }
                },
                None => {
                    let all: Map<String, Value> = catalog
                        .stages()
                        .filter_map(|s| render(s).map(|doc| (s.to_string(), doc)))
                        .collect();
                    print_json(&Value::Object(all))?;
                }
            }
            Ok(true)
        }

        Command::Walkthrough { ticket_id } => {
            let report = run_walkthrough(&ticket_id)?;
            let ok = report.final_envelope.state == Stage::Complete && report.chain_intact;
            print_json(&report)?;
            Ok(ok)
        }
    }
}

// ── I/O helpers ───────────────────────────────────────────────────────────────

fn read_document(file: Option<&Path>) -> InterlockResult<String> {
    let read_error = |reason: String| InterlockError::InvalidArgument {
        field: "file".to_string(),
        reason,
    };
    match file {
        Some(path) if path != Path::new("-") => {
            debug!(path = %path.display(), "reading ticket document");
            std::fs::read_to_string(path)
                .map_err(|e| read_error(format!("cannot read '{}': {}", path.display(), e)))
        }
        _ => {
            let mut document = String::new();
            std::io::stdin()
                .read_to_string(&mut document)
                .map_err(|e| read_error(format!("cannot read stdin: {}", e)))?;
            Ok(document)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> InterlockResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
