//! Catalog contracts consumed by the pipelines.
//!
//! Implemented by the PostgreSQL repositories in [`crate::repositories`]
//! and by [`crate::memory::MemoryCatalog`].

use async_trait::async_trait;

use obsarchive_core::config::StageSelectionConfig;
use obsarchive_core::result::AppResult;
use obsarchive_core::traits::ObjectStore;
use obsarchive_core::types::{DeleteRequestId, ObsId};
use obsarchive_entity::file::DataFile;
use obsarchive_entity::request::{DeleteRequest, FileScope};

/// Result of one delete-and-record step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedDeletion {
    /// Keys the storage backend confirmed as deleted.
    pub confirmed: Vec<String>,
    /// Catalog rows that moved from undeleted to deleted.
    pub rows_updated: u64,
}

/// Catalog operations needed by bulk deletion and reconciliation.
#[async_trait]
pub trait DeleteCatalog: Send + Sync + 'static {
    /// Approved, uncancelled, unactioned requests in creation order,
    /// optionally restricted to `ids`.
    async fn eligible_requests(
        &self,
        ids: Option<&[DeleteRequestId]>,
    ) -> AppResult<Vec<DeleteRequest>>;

    /// The request's `filetype_id`. A request that does not exist is a
    /// `NotFound` error.
    async fn request_filetype(&self, request: DeleteRequestId) -> AppResult<Option<i32>>;

    /// Observation ids attached to a request, ascending.
    async fn request_observations(&self, request: DeleteRequestId) -> AppResult<Vec<ObsId>>;

    /// Remote-archived files of `obs` inside `scope` whose
    /// `deleted_timestamp` is still null, in filename order.
    async fn undeleted_files(&self, obs: ObsId, scope: FileScope) -> AppResult<Vec<DataFile>>;

    /// Delete `keys` from `bucket` through `store` and record the confirmed
    /// deletions, as one unit.
    ///
    /// A catalog transaction brackets the storage call and the matching
    /// update. If the storage call fails nothing is written and the error is
    /// returned. Otherwise only files whose key the backend confirmed are
    /// marked deleted, and the transaction commits.
    async fn delete_and_record(
        &self,
        store: &dyn ObjectStore,
        bucket: &str,
        keys: &[String],
    ) -> AppResult<RecordedDeletion>;

    /// Mark an observation deleted. Already-deleted observations are left
    /// untouched. Returns the number of rows changed.
    async fn mark_observation_deleted(&self, obs: ObsId) -> AppResult<u64>;

    /// Mark a request actioned. Already-actioned requests are left
    /// untouched. Returns the number of rows changed.
    async fn mark_request_actioned(&self, request: DeleteRequestId) -> AppResult<u64>;

    /// Release any pooled resources.
    async fn close(&self) {}
}

/// Catalog operations needed by the staging pipeline and the
/// incomplete-upload reviewer.
#[async_trait]
pub trait ObservationCatalog: Send + Sync + 'static {
    /// Undeleted observations matching `selection`, ascending.
    async fn observations_to_stage(&self, selection: &StageSelectionConfig)
    -> AppResult<Vec<ObsId>>;

    /// All remote-archived, undeleted files of an observation, in filename
    /// order.
    async fn observation_files(&self, obs: ObsId) -> AppResult<Vec<DataFile>>;

    /// The recorded MD5 checksum of one file.
    async fn file_checksum(&self, obs: ObsId, filename: &str) -> AppResult<Option<String>>;

    /// Release any pooled resources.
    async fn close(&self) {}
}
