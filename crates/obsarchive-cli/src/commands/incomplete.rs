//! `incomplete`: clean up incomplete multipart uploads on one location.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;

use obsarchive_core::result::AppResult;
use obsarchive_database::ObservationRepository;
use obsarchive_service::IncompleteUploadReviewer;
use obsarchive_storage::providers::S3ObjectStore;

use crate::output::{self, OutputFormat};

/// Arguments for `incomplete`
#[derive(Debug, Args)]
pub struct IncompleteArgs {
    /// Path to the configuration file
    #[arg(long)]
    pub cfg: PathBuf,

    /// Location to review: acacia_mwaingest, banksia or acacia_mwa
    #[arg(long)]
    pub location: String,

    /// Compare checksums only; no upload is aborted
    #[arg(long = "dry_run")]
    pub dry_run: bool,

    /// Log at info level
    #[arg(short, long)]
    pub verbose: bool,
}

/// Execute `incomplete`
pub async fn execute(
    args: &IncompleteArgs,
    format: OutputFormat,
    cancel: CancellationToken,
) -> AppResult<()> {
    let config = super::load_config(&args.cfg)?;
    let location = config.location(&args.location)?;
    let store = S3ObjectStore::connect(&args.location, location).await?;
    let pool = super::connect_catalog(&config).await?;

    let reviewer = IncompleteUploadReviewer::new(
        Arc::new(store),
        Arc::new(ObservationRepository::new(pool.pool().clone())),
        &config.incomplete,
        args.dry_run,
        cancel,
    );

    let result = reviewer.run().await;
    pool.close().await;

    let summary = result?;
    summary.log();
    output::print_incomplete_summary(&args.location, &summary, format);
    Ok(())
}
