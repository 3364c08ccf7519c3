//! Incomplete upload reviewer.
//!
//! An incomplete multipart upload is left behind when an upload is retried
//! after a failure. Once the completed object's MD5 matches the catalog
//! checksum the leftover upload is safe to abort. Uploads of observations
//! younger than `min_age_days` are left alone; they may still be in flight.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use obsarchive_core::config::IncompleteConfig;
use obsarchive_core::result::AppResult;
use obsarchive_core::traits::{IncompleteUpload, IncompleteUploadStore};
use obsarchive_core::types::ObsId;
use obsarchive_core::types::gps::gps_now;
use obsarchive_database::ObservationCatalog;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Counters for one location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IncompleteSummary {
    /// Incomplete uploads listed.
    pub found: usize,
    /// Uploads left alone because the observation is too recent.
    pub too_new: usize,
    /// Uploads checked.
    pub processed: usize,
    /// Uploads whose checksums matched.
    pub matched: usize,
    /// Uploads aborted.
    pub removed: usize,
    /// Uploads that could not be verified or removed.
    pub failed: usize,
}

impl IncompleteSummary {
    /// Log the summary lines.
    pub fn log(&self) {
        tracing::info!("Incomplete files processed: {}", self.processed);
        tracing::info!("Incomplete files successfully removed: {}", self.removed);
        if self.failed > 0 {
            tracing::warn!("Incomplete files FAILED: {}", self.failed);
        }
    }
}

enum Verdict {
    Removed,
    WouldRemove,
    Mismatch,
}

/// Reviews every incomplete upload on one location.
pub struct IncompleteUploadReviewer {
    store: Arc<dyn IncompleteUploadStore>,
    catalog: Arc<dyn ObservationCatalog>,
    min_age_days: i64,
    dry_run: bool,
    cancel: CancellationToken,
}

impl std::fmt::Debug for IncompleteUploadReviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncompleteUploadReviewer")
            .field("store", &self.store)
            .field("min_age_days", &self.min_age_days)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl IncompleteUploadReviewer {
    /// Creates a reviewer for one location's incomplete uploads. Uploads
    /// younger than `config.min_age_days` are left alone.
    pub fn new(
        store: Arc<dyn IncompleteUploadStore>,
        catalog: Arc<dyn ObservationCatalog>,
        config: &IncompleteConfig,
        dry_run: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            catalog,
            min_age_days: config.min_age_days,
            dry_run,
            cancel,
        }
    }

    /// Review every bucket. Per-upload errors are counted, not returned;
    /// listing failures are.
    pub async fn run(&self) -> AppResult<IncompleteSummary> {
        self.run_at(gps_now()).await
    }

    /// Same as [`run`](Self::run) with an explicit current GPS time.
    pub async fn run_at(&self, now_gps: i64) -> AppResult<IncompleteSummary> {
        let mut summary = IncompleteSummary::default();
        let min_age = self.min_age_days * SECONDS_PER_DAY;

        for bucket in self.store.list_buckets().await? {
            let uploads = self.store.list_incomplete_uploads(&bucket).await?;
            summary.found += uploads.len();

            for upload in uploads {
                if self.cancel.is_cancelled() {
                    tracing::info!("Interrupted. Stopping review");
                    return Ok(summary);
                }

                let Some(obs) = ObsId::from_filename(upload.filename()) else {
                    tracing::warn!(key = %upload.key, "Cannot determine observation; skipping");
                    summary.failed += 1;
                    continue;
                };
                if now_gps - obs.get() <= min_age {
                    tracing::warn!(key = %upload.key, "Ignoring as it is too new");
                    summary.too_new += 1;
                    continue;
                }

                summary.processed += 1;
                match self.review_upload(&upload, obs).await {
                    Ok(Verdict::Removed) => {
                        summary.matched += 1;
                        summary.removed += 1;
                    }
                    Ok(Verdict::WouldRemove) => summary.matched += 1,
                    Ok(Verdict::Mismatch) => summary.failed += 1,
                    Err(e) => {
                        tracing::error!(key = %upload.key, "Review failed: {}", e);
                        summary.failed += 1;
                    }
                }
            }
        }
        Ok(summary)
    }

    async fn review_upload(&self, upload: &IncompleteUpload, obs: ObsId) -> AppResult<Verdict> {
        let catalog_md5 = self.catalog.file_checksum(obs, upload.filename()).await?;
        let object_md5 = self.store.object_md5(&upload.bucket, &upload.key).await?;

        let (Some(expected), Some(actual)) = (catalog_md5, object_md5) else {
            tracing::error!(key = %upload.key, "Checksum missing from catalog or storage");
            return Ok(Verdict::Mismatch);
        };
        if !expected.eq_ignore_ascii_case(&actual) {
            tracing::error!(
                key = %upload.key,
                "Checksum (DB) {} does not match Checksum (file) {}",
                expected,
                actual
            );
            return Ok(Verdict::Mismatch);
        }

        tracing::info!(key = %upload.key, "Checksums match ({})", expected);
        if self.dry_run {
            tracing::info!(key = %upload.key, "Dry run: would remove incomplete upload");
            return Ok(Verdict::WouldRemove);
        }

        self.store.abort_upload(upload).await?;
        tracing::info!(key = %upload.key, "Incomplete upload removed");
        Ok(Verdict::Removed)
    }
}
