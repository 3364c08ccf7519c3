//! Staging pipeline: recalls each observation's files from tape and copies
//! them into the observation's scratch directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;

use obsarchive_core::config::StageSelectionConfig;
use obsarchive_core::error::AppError;
use obsarchive_core::result::AppResult;
use obsarchive_core::types::ObsId;
use obsarchive_database::ObservationCatalog;
use obsarchive_storage::StagingClient;
use obsarchive_worker::{FinalizePolicy, ItemOutcome, ObservationPipeline, UnitContext};

/// Per-observation result recorded by finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Files listed.
    pub files: usize,
    /// Files copied.
    pub copied: usize,
    /// Files that could not be copied.
    pub failed: usize,
}

/// Recalls observations from tape.
pub struct StagePipeline {
    catalog: Arc<dyn ObservationCatalog>,
    staging: StagingClient,
    selection: StageSelectionConfig,
    staged_root: PathBuf,
    files: DashMap<ObsId, Vec<String>>,
    reports: Mutex<BTreeMap<ObsId, StageReport>>,
}

impl std::fmt::Debug for StagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagePipeline")
            .field("selection", &self.selection)
            .field("staged_root", &self.staged_root)
            .finish()
    }
}

impl StagePipeline {
    /// Creates the pipeline. Recalled files are read from `staged_root`.
    pub fn new(
        catalog: Arc<dyn ObservationCatalog>,
        staging: StagingClient,
        selection: StageSelectionConfig,
        staged_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            staging,
            selection,
            staged_root: staged_root.into(),
            files: DashMap::new(),
            reports: Mutex::new(BTreeMap::new()),
        }
    }

    /// Reports of every finalized observation.
    pub fn reports(&self) -> BTreeMap<ObsId, StageReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn copy_staged(src: &Path, dst: &Path) -> AppResult<u64> {
    tokio::fs::copy(src, dst).await.map_err(|e| {
        AppError::with_source(
            obsarchive_core::error::ErrorKind::Storage,
            format!("Failed to copy {} to {}", src.display(), dst.display()),
            e,
        )
    })
}

#[async_trait]
impl ObservationPipeline for StagePipeline {
    type Unit = ObsId;
    type Item = String;

    fn name(&self) -> &str {
        "stage"
    }

    fn finalize_policy(&self) -> FinalizePolicy {
        FinalizePolicy::Always
    }

    fn uses_working_dir(&self) -> bool {
        true
    }

    async fn discover(&self) -> AppResult<Vec<ObsId>> {
        let observations = self.catalog.observations_to_stage(&self.selection).await?;
        tracing::info!("{} observations selected for staging", observations.len());
        Ok(observations)
    }

    async fn prepare(&self, obs: &ObsId, ctx: &UnitContext) -> AppResult<()> {
        let files: Vec<String> = self
            .catalog
            .observation_files(*obs)
            .await?
            .into_iter()
            .map(|f| f.filename)
            .collect();
        if files.is_empty() {
            return Err(AppError::not_found(format!(
                "Observation {obs} has no archived files"
            )));
        }

        tracing::info!(obs_id = %obs, "Staging {} files", files.len());
        self.staging.stage_with_retry(&files, &ctx.cancel).await?;
        tracing::info!(obs_id = %obs, "Staging complete");

        self.files.insert(*obs, files);
        Ok(())
    }

    async fn list_items(&self, obs: &ObsId, _ctx: &UnitContext) -> AppResult<Option<Vec<String>>> {
        Ok(Some(
            self.files.remove(obs).map(|(_, files)| files).unwrap_or_default(),
        ))
    }

    async fn process_item(&self, obs: &ObsId, filename: &String, ctx: &UnitContext) -> AppResult<()> {
        let src = self.staged_root.join(filename);
        match &ctx.working_dir {
            Some(dir) => {
                let bytes = copy_staged(&src, &dir.join(filename)).await?;
                tracing::debug!(obs_id = %obs, file = %filename, bytes, "Copied");
            }
            None => {
                // No scratch space configured: only confirm the recall.
                tokio::fs::metadata(&src).await.map_err(|e| {
                    AppError::with_source(
                        obsarchive_core::error::ErrorKind::NotFound,
                        format!("Staged file {} is not readable", src.display()),
                        e,
                    )
                })?;
            }
        }
        Ok(())
    }

    async fn finalize(&self, obs: &ObsId, items: &ItemOutcome, _ctx: &UnitContext) -> AppResult<()> {
        let report = StageReport {
            files: items.total,
            copied: items.succeeded,
            failed: items.failed,
        };
        if report.failed > 0 {
            tracing::warn!(obs_id = %obs, "{} of {} files failed", report.failed, report.files);
        } else {
            tracing::info!(obs_id = %obs, "All {} files staged", report.files);
        }
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(*obs, report);
        Ok(())
    }

    async fn close(&self) {
        self.catalog.close().await;
    }
}
