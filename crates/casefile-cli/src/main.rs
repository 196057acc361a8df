//! Casefile CLI: runs one stage of the bulk upload pipeline.
//!
//! Configuration is read from the environment (and `.env`); see `Config::from_env`.

use std::sync::Arc;

use anyhow::Context;
use casefile_cli::{print_json, report_window, Pipeline};
use casefile_core::Config;
use casefile_infra::{init_telemetry, shutdown_telemetry, LogFormat};
use casefile_services::{
    BulkUploadHandler, Dispatcher, EchoPatientDirectory, IngestService, ReportService,
    TransactionalMover, VirusScanGate,
};
use casefile_worker::{MessageHandler, QueueConsumer, QueueConsumerConfig, QueueReceiver};
use chrono::Utc;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "casefile", about = "Bulk upload pipeline for scanned patient records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the staged manifest, dispatch one message per patient and archive it
    Ingest {
        /// Manifest key in the staging store (defaults to METADATA_MANIFEST_KEY)
        #[arg(long)]
        manifest_key: Option<String>,
    },
    /// Consume patient messages until interrupted
    Worker,
    /// Write practice and summary reports for the window ending now
    Report {
        /// Window length in hours (defaults to REPORT_WINDOW_HOURS)
        #[arg(long)]
        window_hours: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let format: LogFormat = config
        .log_format()
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    init_telemetry("casefile", format).map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(environment = %config.environment(), "Starting casefile");

    let pipeline = Pipeline::connect(config).await?;

    let result = match cli.command {
        Commands::Ingest { manifest_key } => ingest(&pipeline, manifest_key).await,
        Commands::Worker => worker(&pipeline).await,
        Commands::Report { window_hours } => report(&pipeline, window_hours).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }
    shutdown_telemetry().await;
    result
}

async fn ingest(pipeline: &Pipeline, manifest_key: Option<String>) -> anyhow::Result<()> {
    let config = &pipeline.config;
    let queue = pipeline.queue().await?;
    let service = IngestService::new(
        pipeline.storage.clone(),
        pipeline.reports.clone(),
        Dispatcher::new(queue),
        config.staging_bucket(),
        manifest_key.unwrap_or_else(|| config.manifest_key().to_string()),
    );

    let summary = service.process_manifest().await?;
    print_json(&summary)
}

async fn worker(pipeline: &Pipeline) -> anyhow::Result<()> {
    let config = &pipeline.config;
    let queue = pipeline.queue().await?;

    let gate = VirusScanGate::new(pipeline.storage.clone(), config.staging_bucket());
    let mover = TransactionalMover::new(
        pipeline.storage.clone(),
        pipeline.documents.clone(),
        config.staging_bucket(),
        config.permanent_bucket(),
    );
    let handler: Arc<dyn MessageHandler> = Arc::new(BulkUploadHandler::new(
        pipeline.reports.clone(),
        Arc::new(EchoPatientDirectory),
        gate,
        mover,
        config.virus_scan_max_attempts(),
    ));

    let receiver: Arc<dyn QueueReceiver> = queue;
    let consumer = QueueConsumer::new(
        receiver,
        QueueConsumerConfig::from_config(config),
        Arc::downgrade(&handler),
    );
    tracing::info!(
        queue_url = %config.metadata_queue_url(),
        max_workers = consumer.config().max_workers,
        "Worker started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    consumer.shutdown().await;
    drop(handler);
    Ok(())
}

async fn report(pipeline: &Pipeline, window_hours: Option<i64>) -> anyhow::Result<()> {
    let window = report_window(window_hours, pipeline.config.report_window_hours())?;
    let service = ReportService::new(
        pipeline.storage.clone(),
        pipeline.reports.clone(),
        pipeline.config.reports_bucket(),
    );

    let outcome = service.generate(Utc::now(), window).await?;
    print_json(&outcome)
}
