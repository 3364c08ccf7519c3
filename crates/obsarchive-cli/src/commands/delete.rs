//! `delete`: process approved delete requests.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;

use obsarchive_core::error::AppError;
use obsarchive_core::result::AppResult;
use obsarchive_core::types::id::parse_request_ids;
use obsarchive_database::DeleteRepository;
use obsarchive_service::{DeleteOrchestrator, ValidationGate, WebServiceValidator};
use obsarchive_storage::StorageManager;
use obsarchive_worker::EngineSettings;

use crate::output::{self, OutputFormat};

/// Arguments for `delete`
#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Comma-separated delete request ids; default is every eligible request
    #[arg(long)]
    pub ids: Option<String>,

    /// Path to the configuration file
    #[arg(long)]
    pub cfg: PathBuf,

    /// Discover and log only; nothing is deleted or updated
    #[arg(long = "dry_run")]
    pub dry_run: bool,

    /// Continue when observations fail validation
    #[arg(long)]
    pub force: bool,

    /// Log at info level
    #[arg(short, long)]
    pub verbose: bool,
}

/// Execute `delete`
pub async fn execute(
    args: &DeleteArgs,
    format: OutputFormat,
    cancel: CancellationToken,
) -> AppResult<()> {
    let ids = args
        .ids
        .as_deref()
        .map(parse_request_ids)
        .transpose()
        .map_err(|e| AppError::validation(format!("Supplied invalid request ID: {e}")))?;

    let config = super::load_config(&args.cfg)?;
    let pool = super::connect_catalog(&config).await?;

    let storage = Arc::new(StorageManager::from_config(&config).await?);
    let validator = WebServiceValidator::new(&config.webservices)?;
    let gate = ValidationGate::new(Arc::new(validator), args.force);

    let orchestrator = DeleteOrchestrator::new(
        Arc::new(DeleteRepository::new(pool.pool().clone())),
        storage,
        gate,
        config.delete.clone(),
        cancel,
    )
    .with_dry_run(args.dry_run)
    .with_review_settings(EngineSettings::from(&config.engine));

    let result = orchestrator.run(ids.as_deref()).await;
    pool.close().await;

    let summary = result?;
    output::print_delete_summary(&summary, format);
    if summary.interrupted {
        output::print_warning("Interrupted; remaining requests were left for the next run");
    }
    Ok(())
}
