//! Reconciliation reviewer.
//!
//! Runs on the work queue engine with one unit per delete request and one
//! item per observation. Each observation's remaining files are fetched
//! again; an emptied observation is marked deleted (for whole-observation
//! requests), and the request is marked actioned in the finalize stage,
//! which only runs when every observation came back empty. Any error while
//! checking a request counts against it, so a request that is neither
//! actioned nor failed was never reviewed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;

use obsarchive_core::error::AppError;
use obsarchive_core::result::AppResult;
use obsarchive_core::types::{DeleteRequestId, ObsId};
use obsarchive_database::DeleteCatalog;
use obsarchive_entity::request::FileScope;
use obsarchive_worker::{FinalizePolicy, ItemOutcome, ObservationPipeline, UnitContext};

/// End-of-run reconciliation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    /// Requests reviewed.
    pub total: usize,
    /// Requests marked actioned (or that would be, in a dry run).
    pub actioned: usize,
    /// Requests left un-actioned, with their incomplete observations.
    pub failed: BTreeMap<DeleteRequestId, Vec<ObsId>>,
    /// Requests shutdown stopped before they were actioned or failed.
    pub unreviewed: Vec<DeleteRequestId>,
}

impl ReviewSummary {
    /// Log the summary lines.
    pub fn log(&self) {
        tracing::info!("Delete requests to process: {}", self.total);
        tracing::info!("Delete requests actioned: {}", self.actioned);
        for (request_id, observations) in &self.failed {
            let ids: Vec<String> = observations.iter().map(ToString::to_string).collect();
            tracing::warn!(
                request_id = %request_id,
                "Delete request {} failed; incomplete observations: {}",
                request_id,
                ids.join(", ")
            );
        }
        for request_id in &self.unreviewed {
            tracing::warn!(
                request_id = %request_id,
                "Delete request {} was not reviewed before shutdown; it stays un-actioned",
                request_id
            );
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    scopes: HashMap<DeleteRequestId, FileScope>,
    actioned: BTreeSet<DeleteRequestId>,
    failed: BTreeMap<DeleteRequestId, BTreeSet<ObsId>>,
}

/// Marks observations deleted and requests actioned once nothing remains.
pub struct ReconciliationReviewer {
    catalog: Arc<dyn DeleteCatalog>,
    requests: BTreeMap<DeleteRequestId, Vec<ObsId>>,
    dry_run: bool,
    tally: Mutex<Tally>,
}

impl std::fmt::Debug for ReconciliationReviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationReviewer")
            .field("requests", &self.requests.len())
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl ReconciliationReviewer {
    /// Review `requests` (request → every observation it touched).
    pub fn new(
        catalog: Arc<dyn DeleteCatalog>,
        requests: BTreeMap<DeleteRequestId, Vec<ObsId>>,
        dry_run: bool,
    ) -> Self {
        Self {
            catalog,
            requests,
            dry_run,
            tally: Mutex::new(Tally::default()),
        }
    }

    fn tally(&self) -> std::sync::MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_failure(&self, request: DeleteRequestId, observations: &[ObsId]) {
        let mut tally = self.tally();
        let failed = tally.failed.entry(request).or_default();
        failed.extend(observations.iter().copied());
    }

    fn scope_of(&self, request: DeleteRequestId) -> AppResult<FileScope> {
        self.tally()
            .scopes
            .get(&request)
            .copied()
            .ok_or_else(|| AppError::internal(format!("No scope loaded for request {request}")))
    }

    /// The accumulated result so far.
    pub fn summary(&self) -> ReviewSummary {
        let tally = self.tally();
        ReviewSummary {
            total: self.requests.len(),
            actioned: tally.actioned.len(),
            failed: tally
                .failed
                .iter()
                .map(|(id, obs)| (*id, obs.iter().copied().collect()))
                .collect(),
            unreviewed: self
                .requests
                .keys()
                .copied()
                .filter(|id| !tally.actioned.contains(id) && !tally.failed.contains_key(id))
                .collect(),
        }
    }

    async fn check_observation(&self, request: DeleteRequestId, obs: ObsId) -> AppResult<()> {
        let scope = self.scope_of(request)?;
        let remaining = self.catalog.undeleted_files(obs, scope).await?;

        if !remaining.is_empty() {
            tracing::warn!(
                request_id = %request,
                obs_id = %obs,
                "{} files remain undeleted",
                remaining.len()
            );
            return Err(AppError::storage(format!(
                "Observation {obs} still has {} undeleted files",
                remaining.len()
            )));
        }

        if scope.deletes_observation() {
            if self.dry_run {
                tracing::info!(obs_id = %obs, "Dry run: would mark observation deleted");
            } else {
                self.catalog.mark_observation_deleted(obs).await?;
                tracing::debug!(obs_id = %obs, "Observation marked deleted");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObservationPipeline for ReconciliationReviewer {
    type Unit = DeleteRequestId;
    type Item = ObsId;

    fn name(&self) -> &str {
        "reconciliation"
    }

    fn finalize_policy(&self) -> FinalizePolicy {
        FinalizePolicy::OnlyIfAllSucceeded
    }

    async fn discover(&self) -> AppResult<Vec<DeleteRequestId>> {
        Ok(self.requests.keys().copied().collect())
    }

    async fn prepare(&self, unit: &DeleteRequestId, _ctx: &UnitContext) -> AppResult<()> {
        match self.catalog.request_filetype(*unit).await {
            Ok(filetype) => {
                let scope = FileScope::from_filetype_id(filetype);
                self.tally().scopes.insert(*unit, scope);
                Ok(())
            }
            Err(e) => {
                let observations = self.requests.get(unit).map(Vec::as_slice).unwrap_or_default();
                self.record_failure(*unit, observations);
                Err(e)
            }
        }
    }

    async fn list_items(
        &self,
        unit: &DeleteRequestId,
        _ctx: &UnitContext,
    ) -> AppResult<Option<Vec<ObsId>>> {
        Ok(Some(self.requests.get(unit).cloned().unwrap_or_default()))
    }

    async fn process_item(
        &self,
        unit: &DeleteRequestId,
        obs: &ObsId,
        _ctx: &UnitContext,
    ) -> AppResult<()> {
        let result = self.check_observation(*unit, *obs).await;
        if result.is_err() {
            self.record_failure(*unit, std::slice::from_ref(obs));
        }
        result
    }

    async fn finalize(
        &self,
        unit: &DeleteRequestId,
        _items: &ItemOutcome,
        _ctx: &UnitContext,
    ) -> AppResult<()> {
        if self.dry_run {
            tracing::info!(request_id = %unit, "Dry run: would mark request actioned");
        } else {
            if let Err(e) = self.catalog.mark_request_actioned(*unit).await {
                self.record_failure(*unit, &[]);
                return Err(e);
            }
            tracing::info!(request_id = %unit, "Delete request actioned");
        }
        self.tally().actioned.insert(*unit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsarchive_core::traits::ObjectStore;
    use obsarchive_database::{MemoryCatalog, RecordedDeletion};
    use obsarchive_entity::file::{DataFile, FileType};
    use obsarchive_entity::request::DeleteRequest;
    use obsarchive_worker::{EngineSettings, WorkQueueEngine};
    use tokio_util::sync::CancellationToken;

    /// Memory catalog whose lookups fail for chosen requests or observations.
    struct UnreliableCatalog {
        inner: Arc<MemoryCatalog>,
        filetype_fails_for: Option<DeleteRequestId>,
        files_fail_for: Option<ObsId>,
    }

    impl UnreliableCatalog {
        fn new(inner: Arc<MemoryCatalog>) -> Self {
            Self {
                inner,
                filetype_fails_for: None,
                files_fail_for: None,
            }
        }
    }

    #[async_trait]
    impl DeleteCatalog for UnreliableCatalog {
        async fn eligible_requests(
            &self,
            ids: Option<&[DeleteRequestId]>,
        ) -> AppResult<Vec<DeleteRequest>> {
            self.inner.eligible_requests(ids).await
        }

        async fn request_filetype(&self, request: DeleteRequestId) -> AppResult<Option<i32>> {
            if self.filetype_fails_for == Some(request) {
                return Err(AppError::database("connection reset"));
            }
            self.inner.request_filetype(request).await
        }

        async fn request_observations(&self, request: DeleteRequestId) -> AppResult<Vec<ObsId>> {
            self.inner.request_observations(request).await
        }

        async fn undeleted_files(&self, obs: ObsId, scope: FileScope) -> AppResult<Vec<DataFile>> {
            if self.files_fail_for == Some(obs) {
                return Err(AppError::database("connection reset"));
            }
            self.inner.undeleted_files(obs, scope).await
        }

        async fn delete_and_record(
            &self,
            store: &dyn ObjectStore,
            bucket: &str,
            keys: &[String],
        ) -> AppResult<RecordedDeletion> {
            self.inner.delete_and_record(store, bucket, keys).await
        }

        async fn mark_observation_deleted(&self, obs: ObsId) -> AppResult<u64> {
            self.inner.mark_observation_deleted(obs).await
        }

        async fn mark_request_actioned(&self, request: DeleteRequestId) -> AppResult<u64> {
            self.inner.mark_request_actioned(request).await
        }
    }

    const A: ObsId = ObsId(1_200_000_000);
    const B: ObsId = ObsId(1_200_000_008);

    fn file(obs: ObsId, suffix: &str) -> DataFile {
        DataFile::new(obs, format!("{obs}_{suffix}.fits"), 3, "mwa01fs", None)
    }

    async fn review(catalog: Arc<dyn DeleteCatalog>, requests: BTreeMap<DeleteRequestId, Vec<ObsId>>, dry_run: bool) -> ReviewSummary {
        let reviewer = Arc::new(ReconciliationReviewer::new(catalog, requests, dry_run));
        let engine = WorkQueueEngine::new(
            reviewer.clone(),
            EngineSettings {
                unit_workers: 2,
                item_workers: 2,
                working_path: None,
            },
            CancellationToken::new(),
        );
        engine.run().await.unwrap();
        engine.shutdown().await;
        reviewer.summary()
    }

    #[tokio::test]
    async fn empty_observations_are_marked_and_request_actioned() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.add_request(DeleteRequestId(1), None, &[A, B]).unwrap();
        // PPD files never block a whole-observation request
        catalog.add_file(file(A, "metafits"), FileType::Ppd.id()).unwrap();

        let requests = BTreeMap::from([(DeleteRequestId(1), vec![A, B])]);
        let summary = review(catalog.clone(), requests, false).await;

        assert_eq!(summary.total, 1);
        assert_eq!(summary.actioned, 1);
        assert!(summary.failed.is_empty());
        assert!(catalog.is_observation_deleted(A).unwrap());
        assert!(catalog.is_observation_deleted(B).unwrap());
        assert!(catalog.is_request_actioned(DeleteRequestId(1)).unwrap());
    }

    #[tokio::test]
    async fn remaining_file_blocks_the_request() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.add_request(DeleteRequestId(2), None, &[A, B]).unwrap();
        catalog.add_file(file(B, "ch01"), FileType::MwaxVisibilities.id()).unwrap();

        let requests = BTreeMap::from([(DeleteRequestId(2), vec![A, B])]);
        let summary = review(catalog.clone(), requests, false).await;

        assert_eq!(summary.actioned, 0);
        assert_eq!(summary.failed.get(&DeleteRequestId(2)), Some(&vec![B]));
        assert!(catalog.is_observation_deleted(A).unwrap());
        assert!(!catalog.is_observation_deleted(B).unwrap());
        assert!(!catalog.is_request_actioned(DeleteRequestId(2)).unwrap());
    }

    #[tokio::test]
    async fn filetype_scoped_request_leaves_observation() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog
            .add_request(DeleteRequestId(3), Some(FileType::MwaxVoltages.id()), &[A])
            .unwrap();
        catalog.add_file(file(A, "ch01"), FileType::MwaxVisibilities.id()).unwrap();

        let requests = BTreeMap::from([(DeleteRequestId(3), vec![A])]);
        let summary = review(catalog.clone(), requests, false).await;

        assert_eq!(summary.actioned, 1);
        assert!(!catalog.is_observation_deleted(A).unwrap());
        assert!(catalog.is_request_actioned(DeleteRequestId(3)).unwrap());
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.add_request(DeleteRequestId(4), None, &[A]).unwrap();

        let requests = BTreeMap::from([(DeleteRequestId(4), vec![A])]);
        let summary = review(catalog.clone(), requests, true).await;

        assert_eq!(summary.actioned, 1);
        assert_eq!(catalog.write_count().unwrap(), 0);
        assert!(!catalog.is_request_actioned(DeleteRequestId(4)).unwrap());
    }

    #[tokio::test]
    async fn lookup_error_fails_the_observation() {
        let memory = Arc::new(MemoryCatalog::new());
        memory.add_request(DeleteRequestId(5), None, &[A, B]).unwrap();
        let catalog = UnreliableCatalog {
            files_fail_for: Some(B),
            ..UnreliableCatalog::new(memory.clone())
        };

        let requests = BTreeMap::from([(DeleteRequestId(5), vec![A, B])]);
        let summary = review(Arc::new(catalog), requests, false).await;

        assert_eq!(summary.actioned, 0);
        assert_eq!(summary.failed.get(&DeleteRequestId(5)), Some(&vec![B]));
        assert!(summary.unreviewed.is_empty());
        assert!(memory.is_observation_deleted(A).unwrap());
        assert!(!memory.is_request_actioned(DeleteRequestId(5)).unwrap());
    }

    #[tokio::test]
    async fn scope_lookup_error_fails_every_observation() {
        let memory = Arc::new(MemoryCatalog::new());
        memory.add_request(DeleteRequestId(6), None, &[A, B]).unwrap();
        memory.add_request(DeleteRequestId(7), None, &[A]).unwrap();
        let catalog = UnreliableCatalog {
            filetype_fails_for: Some(DeleteRequestId(6)),
            ..UnreliableCatalog::new(memory.clone())
        };

        let requests = BTreeMap::from([
            (DeleteRequestId(6), vec![A, B]),
            (DeleteRequestId(7), vec![A]),
        ]);
        let summary = review(Arc::new(catalog), requests, false).await;

        assert_eq!(summary.total, 2);
        assert_eq!(summary.actioned, 1);
        assert_eq!(summary.failed.get(&DeleteRequestId(6)), Some(&vec![A, B]));
        assert!(summary.unreviewed.is_empty());
        assert!(!memory.is_request_actioned(DeleteRequestId(6)).unwrap());
        assert!(memory.is_request_actioned(DeleteRequestId(7)).unwrap());
    }

    #[test]
    fn requests_neither_actioned_nor_failed_are_unreviewed() {
        let requests = BTreeMap::from([
            (DeleteRequestId(1), vec![A]),
            (DeleteRequestId(2), vec![B]),
        ]);
        let reviewer = ReconciliationReviewer::new(Arc::new(MemoryCatalog::new()), requests, false);
        reviewer.tally().actioned.insert(DeleteRequestId(1));

        let summary = reviewer.summary();
        assert_eq!(summary.unreviewed, vec![DeleteRequestId(2)]);
    }
}
