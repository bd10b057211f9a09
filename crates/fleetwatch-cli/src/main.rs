//! Fleetwatch command-line entry point.
//!
//! Meant to be driven by an external scheduler: each `etl` invocation is
//! one ingestion pass. Statistics are printed to stdout as JSON, logs go
//! to stderr.

mod config;

use std::sync::atomic::Ordering;

use anyhow::Context;
use clap::Parser;
use fleetwatch_db::DbManager;
use fleetwatch_etl::{AnalyticsService, EtlError, EtlService, TelemetryClient};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Command, EtlArgs, SummaryArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let filter = match "fleetwatch=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let manager = DbManager::connect(&cli.db.to_config())
        .await
        .context("failed to connect to SurrealDB")?;

    match cli.command {
        Command::Migrate => {
            let applied = manager
                .migrate()
                .await
                .context("failed to apply migrations")?;
            tracing::info!(?applied, "Schema up to date");
        }
        Command::Etl(args) => run_etl(&manager, args).await?,
        Command::Summary(args) => run_summary(&manager, args).await?,
    }

    Ok(())
}

async fn run_etl(manager: &DbManager, args: EtlArgs) -> anyhow::Result<()> {
    let config = args.to_config();
    let source = TelemetryClient::new(config.fetcher.clone())?;
    let service = EtlService::new(manager.store(), source, config);

    let cancel = service.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current batch");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    tracing::info!(max_pages = args.max_pages, "Starting ETL run");
    match service.run(args.max_pages).await {
        Ok(stats) => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            tracing::info!(
                registers_created = stats.registers_created,
                errors = stats.errors,
                "ETL run finished"
            );
            Ok(())
        }
        Err(err) => {
            if let Some(stats) = err.partial_stats() {
                println!("{}", serde_json::to_string_pretty(stats)?);
            }
            if let EtlError::ResponseFormat { excerpt, .. } = &err {
                tracing::error!(excerpt = %excerpt, "Unexpected telemetry payload");
            }
            Err(err).context("ETL run failed")
        }
    }
}

async fn run_summary(manager: &DbManager, args: SummaryArgs) -> anyhow::Result<()> {
    let analytics = AnalyticsService::new(manager.store(), args.rules.to_config().offset());
    let matrix = analytics
        .summary_matrix(args.start, args.end, args.group)
        .await
        .context("failed to build summary")?;
    println!("{}", serde_json::to_string_pretty(&matrix)?);
    Ok(())
}
