//! credential-cache CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::eyre;
use credential_cache::{fingerprint, LoadStatus, RecordId, VerificationOrchestrator};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("credential-cache v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.to_config()?;

    if let Command::Fingerprint { ref file } = cli.command {
        println!("{}", fingerprint(&std::fs::read(file)?));
        return Ok(());
    }

    let orchestrator = VerificationOrchestrator::open(config)?;

    match cli.command {
        Command::Fingerprint { .. } => {}
        Command::Lookup { subject, file } => {
            let fp = fingerprint(&std::fs::read(&file)?);
            match orchestrator.store().lookup(&subject, &fp) {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => {
                    return Err(eyre!("no record for {} / {}", subject, fp));
                }
            }
        }
        Command::Audit { record_id } => {
            let record_id: RecordId = record_id
                .parse()
                .map_err(|e| eyre!("invalid record id: {e}"))?;
            let report = orchestrator.audit(&record_id);
            let output = json!({
                "valid": report.valid,
                "record": report.record,
                "auditLatencyMs": report.latency.as_secs_f64() * 1000.0,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Evict { subject, file } => {
            let removed = orchestrator.evict(&subject, &std::fs::read(&file)?)?;
            println!("{}", if removed { "evicted" } else { "not found" });
        }
        Command::List => {
            println!("{}", serde_json::to_string_pretty(&orchestrator.store().records())?);
        }
        Command::Stats => {
            let recovered = matches!(orchestrator.load_status(), LoadStatus::Recovered { .. });
            let output = json!({
                "log": orchestrator.config().log_path(),
                "records": orchestrator.store().len(),
                "recoveredFromCorruption": recovered,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
