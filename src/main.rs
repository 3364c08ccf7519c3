//! Observation staging processor.
//!
//! Recalls each selected observation's files from tape and copies them into a
//! per-observation working directory, with status endpoints for monitoring.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use obsarchive_core::config::AppConfig;
use obsarchive_core::error::AppError;
use obsarchive_database::{DatabasePool, ObservationRepository};
use obsarchive_service::StagePipeline;
use obsarchive_storage::StagingClient;
use obsarchive_worker::{EngineControl, EngineSettings, WorkQueueEngine};

/// Stage observations from tape on a pool of workers
#[derive(Debug, Parser)]
#[command(name = "obsarchive-processor", version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/default.toml")]
    cfg: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load(&args.cfg) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Processor error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main processor run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting obsarchive-processor v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Shutdown token + signal handling ─────────────────
    let cancel = CancellationToken::new();
    let signals = obsarchive_worker::signal::spawn_signal_listener(cancel.clone());

    // ── Step 2: Database connection ──────────────────────────────
    tracing::info!("Connecting to database...");
    let db_pool = DatabasePool::connect(&config.database).await?;
    let catalog = Arc::new(ObservationRepository::new(db_pool.pool().clone()));

    // ── Step 3: Staging pipeline + engine ────────────────────────
    let pipeline = Arc::new(StagePipeline::new(
        catalog,
        StagingClient::new(&config.staging),
        config.stage.clone(),
        config.staging.staged_root.clone(),
    ));
    let engine = WorkQueueEngine::new(
        pipeline,
        EngineSettings::from(&config.engine),
        cancel.clone(),
    );

    // ── Step 4: Status endpoints ─────────────────────────────────
    let control: Arc<dyn EngineControl> = Arc::new(engine.clone());
    let host = config.engine.web_service_host.clone();
    let port = config.engine.web_service_port;
    let server_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = obsarchive_api::serve(&host, port, control, server_cancel).await {
            tracing::error!("Status endpoints failed: {}", e);
        }
    });

    // ── Step 5: Process until the queue is empty or interrupted ──
    let result = engine.run().await;
    if let Err(e) = &result {
        tracing::error!("Engine stopped with error: {}", e);
    }

    // ── Step 6: Graceful shutdown ────────────────────────────────
    let stats = engine.shutdown().await;
    let _ = server.await;
    signals.abort();
    db_pool.close().await;

    if !stats.is_balanced(engine.pending() as u64) {
        tracing::warn!(?stats, "Observation counters do not add up");
    }

    tracing::info!("obsarchive-processor shut down gracefully");
    result.map(|_| ())
}
