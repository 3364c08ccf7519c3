//! Delete orchestrator.
//!
//! A run has three phases:
//!
//! 1. Discovery: eligible requests, their observations (validated once per
//!    request) and each observation's undeleted files within the request's
//!    scope, collected into a [`DeletePlan`].
//! 2. Deletion: per location and bucket, keys go out in batches through
//!    [`DeleteCatalog::delete_and_record`], so a batch's catalog update
//!    commits only together with a successful storage call.
//! 3. Reconciliation: the [`ReconciliationReviewer`] runs on the engine
//!    over every touched request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use obsarchive_core::config::DeleteConfig;
use obsarchive_core::error::{AppError, ErrorKind};
use obsarchive_core::result::AppResult;
use obsarchive_core::retry::{RetryPolicy, retry};
use obsarchive_core::types::{DeleteRequestId, ObsId, batches};
use obsarchive_database::DeleteCatalog;
use obsarchive_entity::file::StorageLocation;
use obsarchive_storage::StorageManager;
use obsarchive_worker::{EngineSettings, WorkQueueEngine};

use super::plan::DeletePlan;
use crate::error::DeleteRunError;
use crate::review::{ReconciliationReviewer, ReviewSummary};
use crate::validation::ValidationGate;

/// Counters from the deletion phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeletionTotals {
    /// Batches issued (or logged, in a dry run).
    pub batches: usize,
    /// Keys sent to storage.
    pub keys_requested: usize,
    /// Keys storage confirmed as deleted.
    pub keys_confirmed: usize,
    /// Catalog file rows marked deleted.
    pub rows_updated: u64,
    /// Batches abandoned after exhausting their retries.
    pub failed_batches: usize,
    /// Shutdown was requested before every batch ran.
    pub stopped_early: bool,
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteRunSummary {
    /// Requests discovered.
    pub requests: usize,
    /// Observations touched.
    pub observations: usize,
    /// Deletion phase counters.
    pub totals: DeletionTotals,
    /// Reconciliation result. When the run was interrupted before
    /// reconciliation, only `total` and `unreviewed` are filled.
    pub review: ReviewSummary,
    /// Shutdown cut the run short.
    pub interrupted: bool,
}

/// Drives delete requests from discovery to reconciliation.
pub struct DeleteOrchestrator {
    catalog: Arc<dyn DeleteCatalog>,
    storage: Arc<StorageManager>,
    gate: ValidationGate,
    config: DeleteConfig,
    review_settings: EngineSettings,
    dry_run: bool,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DeleteOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteOrchestrator")
            .field("config", &self.config)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DeleteOrchestrator {
    /// Creates an orchestrator. `cancel` is the process-wide shutdown token.
    pub fn new(
        catalog: Arc<dyn DeleteCatalog>,
        storage: Arc<StorageManager>,
        gate: ValidationGate,
        config: DeleteConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            storage,
            gate,
            config,
            review_settings: EngineSettings {
                unit_workers: 1,
                item_workers: 4,
                working_path: None,
            },
            dry_run: false,
            cancel,
        }
    }

    /// Log every mutating step instead of performing it.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Worker bounds for the reconciliation engine.
    pub fn with_review_settings(mut self, settings: EngineSettings) -> Self {
        self.review_settings = EngineSettings {
            working_path: None,
            ..settings
        };
        self
    }

    /// Run all three phases over the eligible requests, optionally
    /// restricted to `ids`.
    pub async fn run(
        &self,
        ids: Option<&[DeleteRequestId]>,
    ) -> Result<DeleteRunSummary, DeleteRunError> {
        if self.dry_run {
            tracing::info!("Dry run: no objects will be deleted and no catalog rows updated");
        }

        let plan = self.discover(ids).await?;
        let mut summary = DeleteRunSummary {
            requests: plan.delete_requests.len(),
            observations: plan.delete_requests.values().map(Vec::len).sum(),
            ..DeleteRunSummary::default()
        };
        if plan.is_empty() {
            tracing::info!("No delete requests to process");
            return Ok(summary);
        }

        tracing::info!(
            requests = summary.requests,
            observations = summary.observations,
            keys = plan.key_count(),
            "Discovery complete"
        );

        summary.totals = self.delete_files(&plan).await?;
        tracing::info!(
            batches = summary.totals.batches,
            requested = summary.totals.keys_requested,
            confirmed = summary.totals.keys_confirmed,
            rows = summary.totals.rows_updated,
            failed_batches = summary.totals.failed_batches,
            "Deletion phase complete"
        );

        if summary.totals.stopped_early || self.cancel.is_cancelled() {
            tracing::warn!("Interrupted before reconciliation; requests stay un-actioned");
            summary.interrupted = true;
            summary.review.total = summary.requests;
            summary.review.unreviewed = plan.delete_requests.keys().copied().collect();
            return Ok(summary);
        }

        let (review, interrupted) = self.review(plan.delete_requests).await?;
        if interrupted {
            tracing::warn!(
                "Interrupted during reconciliation; {} requests were not reviewed",
                review.unreviewed.len()
            );
        }
        summary.review = review;
        summary.interrupted = interrupted;
        summary.review.log();
        Ok(summary)
    }

    /// Phase 1: build the plan. Fails closed on validation.
    pub async fn discover(
        &self,
        ids: Option<&[DeleteRequestId]>,
    ) -> Result<DeletePlan, DeleteRunError> {
        let requests = self.catalog.eligible_requests(ids).await?;

        if let Some(ids) = ids {
            for id in ids {
                if !requests.iter().any(|r| r.id == *id) {
                    tracing::warn!(
                        request_id = %id,
                        "Delete request {} is not approved, is cancelled or was already actioned; skipping",
                        id
                    );
                }
            }
        }
        tracing::info!("Found {} delete requests to process", requests.len());

        let mut plan = DeletePlan::default();
        for request in &requests {
            if self.cancel.is_cancelled() {
                return Err(AppError::cancelled("Discovery interrupted").into());
            }

            let obs_ids = self.catalog.request_observations(request.id).await?;
            tracing::info!(
                request_id = %request.id,
                observations = obs_ids.len(),
                filetype = ?request.filetype_id,
                "Processing delete request"
            );
            self.gate.check(request.id, &obs_ids).await?;

            let scope = request.scope();
            for obs in &obs_ids {
                plan.add_observation(request.id, *obs);
                let files = self.catalog.undeleted_files(*obs, scope).await?;
                tracing::debug!(
                    request_id = %request.id,
                    obs_id = %obs,
                    "{} files to delete",
                    files.len()
                );
                for file in &files {
                    plan.add_file(file);
                }
            }
        }
        Ok(plan)
    }

    /// Phase 2: batched delete-and-record.
    pub async fn delete_files(&self, plan: &DeletePlan) -> AppResult<DeletionTotals> {
        let batch_size = self.config.effective_batch_size();
        let policy = RetryPolicy::new(self.config.retry_attempts, self.config.retry_backoff_seconds);

        // Every location must resolve before anything is deleted.
        for location_id in plan.files.keys() {
            self.storage.resolve(*location_id)?;
        }

        let mut totals = DeletionTotals::default();
        for (location_id, buckets) in &plan.files {
            let (location, handle) = self.storage.resolve(*location_id)?;

            for (bucket, keys) in buckets {
                tracing::info!(
                    location = %location,
                    bucket = %bucket,
                    keys = keys.len(),
                    "Deleting from bucket"
                );

                for batch in batches(keys.iter().cloned(), batch_size) {
                    if self.cancel.is_cancelled() {
                        tracing::info!("Interrupted. Not starting another batch");
                        totals.stopped_early = true;
                        return Ok(totals);
                    }

                    let full = batch.len() == batch_size;
                    totals.batches += 1;
                    totals.keys_requested += batch.len();

                    if self.dry_run {
                        tracing::info!(
                            location = %location,
                            bucket = %bucket,
                            "Dry run: would delete {} keys",
                            batch.len()
                        );
                        continue;
                    }

                    // One transaction per attempt; none is open during a backoff.
                    let outcome = retry(policy, &self.cancel, AppError::is_transient, |attempt| {
                        if attempt > 1 {
                            tracing::info!(location = %location, bucket = %bucket, attempt, "Retrying batch");
                        }
                        self.catalog
                            .delete_and_record(handle.store.as_ref(), bucket, &batch)
                    })
                    .await
                    .map_err(AppError::from);

                    match outcome {
                        Ok(recorded) => {
                            if recorded.confirmed.len() < batch.len() {
                                tracing::warn!(
                                    location = %location,
                                    bucket = %bucket,
                                    "{} of {} keys were not confirmed deleted",
                                    batch.len() - recorded.confirmed.len(),
                                    batch.len()
                                );
                            }
                            totals.keys_confirmed += recorded.confirmed.len();
                            totals.rows_updated += recorded.rows_updated;
                        }
                        Err(e) if e.is_cancelled() => {
                            tracing::info!("Interrupted during batch retry; batch rolled back");
                            totals.stopped_early = true;
                            return Ok(totals);
                        }
                        Err(e) if e.kind == ErrorKind::ExternalService => {
                            tracing::error!(
                                location = %location,
                                bucket = %bucket,
                                "Batch of {} keys abandoned: {}",
                                batch.len(),
                                e
                            );
                            totals.failed_batches += 1;
                        }
                        Err(e) => return Err(e),
                    }

                    if full && handle.ingest_sensitive {
                        self.ingest_pause(location).await;
                    }
                }
            }
        }
        Ok(totals)
    }

    async fn ingest_pause(&self, location: StorageLocation) {
        let secs = self.config.ingest_sleep_seconds;
        if secs == 0 {
            return;
        }
        tracing::debug!(location = %location, "Pausing {}s for ingest", secs);
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
        }
    }

    /// Phase 3: reconcile every touched request on the engine. The flag is
    /// set when shutdown stopped or discarded any request.
    async fn review(
        &self,
        requests: BTreeMap<DeleteRequestId, Vec<ObsId>>,
    ) -> AppResult<(ReviewSummary, bool)> {
        let reviewer = Arc::new(ReconciliationReviewer::new(
            Arc::clone(&self.catalog),
            requests,
            self.dry_run,
        ));
        let engine = WorkQueueEngine::new(
            Arc::clone(&reviewer),
            self.review_settings.clone(),
            self.cancel.child_token(),
        );

        let run = engine.run().await;
        let stats = engine.shutdown().await;
        run?;

        let summary = reviewer.summary();
        let interrupted = stats.interrupted > 0
            || stats.drained_units > 0
            || (self.cancel.is_cancelled() && !summary.unreviewed.is_empty());
        Ok((summary, interrupted))
    }
}
