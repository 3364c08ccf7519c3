//! In-memory catalog.
//!
//! Holds delete requests, observations and data files in a single mutex and
//! implements both catalog contracts with the same filters the SQL uses.
//! Pipelines can be driven end to end against it, paired with the in-memory
//! object store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use obsarchive_core::config::StageSelectionConfig;
use obsarchive_core::error::AppError;
use obsarchive_core::result::AppResult;
use obsarchive_core::traits::ObjectStore;
use obsarchive_core::types::{DeleteRequestId, ObsId};
use obsarchive_entity::file::DataFile;
use obsarchive_entity::request::{DeleteRequest, FileScope};

use crate::catalog::{DeleteCatalog, ObservationCatalog, RecordedDeletion};
use crate::repositories::delete::confirmed_filenames;

#[derive(Debug, Clone)]
struct FileRow {
    file: DataFile,
    filetype: i32,
    remote_archived: bool,
    checksum: Option<String>,
    deleted_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct ObservationRow {
    mode: Option<String>,
    dataquality: Option<i32>,
    deleted_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct State {
    requests: BTreeMap<DeleteRequestId, DeleteRequest>,
    request_observations: BTreeMap<DeleteRequestId, BTreeSet<ObsId>>,
    observations: BTreeMap<ObsId, ObservationRow>,
    files: Vec<FileRow>,
    writes: u64,
}

/// A catalog kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<State>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AppError::internal("Memory catalog lock poisoned"))
    }

    /// Add an approved delete request covering `observations`.
    pub fn add_request(
        &self,
        id: DeleteRequestId,
        filetype_id: Option<i32>,
        observations: &[ObsId],
    ) -> AppResult<()> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let created = now + chrono::Duration::milliseconds(state.requests.len() as i64);
        state.requests.insert(
            id,
            DeleteRequest {
                id,
                filetype_id,
                created_datetime: created,
                approved_datetime: Some(now),
                cancelled_datetime: None,
                actioned_datetime: None,
            },
        );
        state
            .request_observations
            .entry(id)
            .or_default()
            .extend(observations.iter().copied());
        for obs in observations {
            state.observations.entry(*obs).or_default();
        }
        Ok(())
    }

    /// Replace a stored request, e.g. to make it cancelled or unapproved.
    pub fn put_request(&self, request: DeleteRequest) -> AppResult<()> {
        self.lock()?.requests.insert(request.id, request);
        Ok(())
    }

    /// Add an observation with optional mode and data quality.
    pub fn add_observation(
        &self,
        obs: ObsId,
        mode: Option<&str>,
        dataquality: Option<i32>,
    ) -> AppResult<()> {
        self.lock()?.observations.insert(
            obs,
            ObservationRow {
                mode: mode.map(str::to_string),
                dataquality,
                deleted_timestamp: None,
            },
        );
        Ok(())
    }

    /// Add a remote-archived, undeleted file.
    pub fn add_file(&self, file: DataFile, filetype: i32) -> AppResult<()> {
        self.add_file_with_checksum(file, filetype, None)
    }

    /// Add a remote-archived, undeleted file with a recorded checksum.
    pub fn add_file_with_checksum(
        &self,
        file: DataFile,
        filetype: i32,
        checksum: Option<&str>,
    ) -> AppResult<()> {
        let mut state = self.lock()?;
        state.observations.entry(file.observation_num).or_default();
        state.files.push(FileRow {
            file,
            filetype,
            remote_archived: true,
            checksum: checksum.map(str::to_string),
            deleted_timestamp: None,
        });
        Ok(())
    }

    /// Filenames whose `deleted_timestamp` is set.
    pub fn deleted_filenames(&self) -> AppResult<Vec<String>> {
        Ok(self
            .lock()?
            .files
            .iter()
            .filter(|f| f.deleted_timestamp.is_some())
            .map(|f| f.file.filename.clone())
            .collect())
    }

    /// Whether an observation has been marked deleted.
    pub fn is_observation_deleted(&self, obs: ObsId) -> AppResult<bool> {
        Ok(self
            .lock()?
            .observations
            .get(&obs)
            .is_some_and(|o| o.deleted_timestamp.is_some()))
    }

    /// Whether a request has been marked actioned.
    pub fn is_request_actioned(&self, request: DeleteRequestId) -> AppResult<bool> {
        Ok(self
            .lock()?
            .requests
            .get(&request)
            .is_some_and(|r| r.actioned_datetime.is_some()))
    }

    /// Number of mutating statements applied so far.
    pub fn write_count(&self) -> AppResult<u64> {
        Ok(self.lock()?.writes)
    }
}

#[async_trait]
impl DeleteCatalog for MemoryCatalog {
    async fn eligible_requests(
        &self,
        ids: Option<&[DeleteRequestId]>,
    ) -> AppResult<Vec<DeleteRequest>> {
        let state = self.lock()?;
        let mut out: Vec<DeleteRequest> = state
            .requests
            .values()
            .filter(|r| r.is_eligible())
            .filter(|r| ids.is_none_or(|ids| ids.contains(&r.id)))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.created_datetime);
        Ok(out)
    }

    async fn request_filetype(&self, request: DeleteRequestId) -> AppResult<Option<i32>> {
        self.lock()?
            .requests
            .get(&request)
            .map(|r| r.filetype_id)
            .ok_or_else(|| AppError::not_found(format!("Delete request {request} not found")))
    }

    async fn request_observations(&self, request: DeleteRequestId) -> AppResult<Vec<ObsId>> {
        Ok(self
            .lock()?
            .request_observations
            .get(&request)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn undeleted_files(&self, obs: ObsId, scope: FileScope) -> AppResult<Vec<DataFile>> {
        let state = self.lock()?;
        let mut files: Vec<DataFile> = state
            .files
            .iter()
            .filter(|f| {
                f.file.observation_num == obs
                    && f.remote_archived
                    && f.deleted_timestamp.is_none()
                    && scope.includes(f.filetype)
            })
            .map(|f| f.file.clone())
            .collect();
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    async fn delete_and_record(
        &self,
        store: &dyn ObjectStore,
        bucket: &str,
        keys: &[String],
    ) -> AppResult<RecordedDeletion> {
        // The lock is not held across the storage call; nothing is staged
        // before it returns, so a failure leaves the catalog untouched.
        let confirmed = store.delete_objects(bucket, keys).await?;
        let (filenames, obs_ids) = confirmed_filenames(&confirmed);

        let mut state = self.lock()?;
        let now = Utc::now();
        let mut rows_updated = 0;
        for row in state.files.iter_mut() {
            if row.deleted_timestamp.is_none()
                && filenames.contains(&row.file.filename)
                && obs_ids.contains(&row.file.observation_num)
            {
                row.deleted_timestamp = Some(now);
                rows_updated += 1;
            }
        }
        if !filenames.is_empty() {
            state.writes += 1;
        }

        Ok(RecordedDeletion {
            confirmed,
            rows_updated,
        })
    }

    async fn mark_observation_deleted(&self, obs: ObsId) -> AppResult<u64> {
        let mut state = self.lock()?;
        state.writes += 1;
        match state.observations.get_mut(&obs) {
            Some(row) if row.deleted_timestamp.is_none() => {
                row.deleted_timestamp = Some(Utc::now());
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn mark_request_actioned(&self, request: DeleteRequestId) -> AppResult<u64> {
        let mut state = self.lock()?;
        state.writes += 1;
        match state.requests.get_mut(&request) {
            Some(row) if row.actioned_datetime.is_none() => {
                row.actioned_datetime = Some(Utc::now());
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[async_trait]
impl ObservationCatalog for MemoryCatalog {
    async fn observations_to_stage(
        &self,
        selection: &StageSelectionConfig,
    ) -> AppResult<Vec<ObsId>> {
        let state = self.lock()?;
        let matching = state
            .observations
            .iter()
            .filter(|(_, o)| o.deleted_timestamp.is_none())
            .filter(|(_, o)| {
                selection
                    .mode
                    .as_deref()
                    .is_none_or(|m| o.mode.as_deref() == Some(m))
            })
            .filter(|(_, o)| selection.dataquality.is_none_or(|q| o.dataquality == Some(q)))
            .filter(|(id, _)| selection.before_obs_id.is_none_or(|b| id.get() < b))
            .map(|(id, _)| *id);

        Ok(match selection.limit {
            Some(limit) => matching.take(limit.max(0) as usize).collect(),
            None => matching.collect(),
        })
    }

    async fn observation_files(&self, obs: ObsId) -> AppResult<Vec<DataFile>> {
        let state = self.lock()?;
        let mut files: Vec<DataFile> = state
            .files
            .iter()
            .filter(|f| {
                f.file.observation_num == obs && f.remote_archived && f.deleted_timestamp.is_none()
            })
            .map(|f| f.file.clone())
            .collect();
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    async fn file_checksum(&self, obs: ObsId, filename: &str) -> AppResult<Option<String>> {
        Ok(self
            .lock()?
            .files
            .iter()
            .find(|f| f.file.observation_num == obs && f.file.filename == filename)
            .and_then(|f| f.checksum.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsarchive_entity::file::FileType;
    use obsarchive_storage::providers::memory::MemoryObjectStore;

    const OBS: ObsId = ObsId(1_200_000_000);

    fn file(name: &str, bucket: &str) -> DataFile {
        DataFile::new(OBS, format!("{}_{name}", OBS), 3, bucket, None)
    }

    #[tokio::test]
    async fn undeleted_files_respect_scope() {
        let catalog = MemoryCatalog::new();
        catalog
            .add_file(file("vis.fits", "b1"), FileType::MwaxVisibilities.id())
            .unwrap();
        catalog
            .add_file(file("ppd.fits", "b1"), FileType::Ppd.id())
            .unwrap();
        catalog
            .add_file(file("vcs.sub", "b1"), FileType::MwaxVoltages.id())
            .unwrap();

        let all = catalog
            .undeleted_files(OBS, FileScope::WholeObservation)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let voltages = catalog
            .undeleted_files(OBS, FileScope::FileType(FileType::MwaxVoltages.id()))
            .await
            .unwrap();
        assert_eq!(voltages.len(), 1);
        assert!(voltages[0].filename.ends_with("vcs.sub"));
    }

    #[tokio::test]
    async fn eligible_requests_filter_and_order() {
        let catalog = MemoryCatalog::new();
        catalog.add_request(DeleteRequestId(2), None, &[OBS]).unwrap();
        catalog.add_request(DeleteRequestId(1), None, &[OBS]).unwrap();
        catalog.add_request(DeleteRequestId(3), None, &[OBS]).unwrap();

        let mut cancelled = catalog
            .eligible_requests(Some(&[DeleteRequestId(3)][..]))
            .await
            .unwrap()
            .remove(0);
        cancelled.cancelled_datetime = Some(Utc::now());
        catalog.put_request(cancelled).unwrap();

        let ids: Vec<_> = catalog
            .eligible_requests(None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![DeleteRequestId(2), DeleteRequestId(1)]);

        let only_one = catalog
            .eligible_requests(Some(&[DeleteRequestId(1)][..]))
            .await
            .unwrap();
        assert_eq!(only_one.len(), 1);
    }

    #[tokio::test]
    async fn failed_storage_call_leaves_catalog_unchanged() {
        let catalog = MemoryCatalog::new();
        let f = file("a.fits", "b1");
        catalog.add_file(f.clone(), 18).unwrap();

        let store = MemoryObjectStore::new("banksia");
        store.put("b1", &f.key);
        store.fail_next_deletes(1, false);

        let err = catalog
            .delete_and_record(&store, "b1", std::slice::from_ref(&f.key))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(catalog.deleted_filenames().unwrap().is_empty());
        assert_eq!(catalog.write_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn only_confirmed_keys_are_recorded() {
        let catalog = MemoryCatalog::new();
        let good = file("good.fits", "b1");
        let bad = file("bad.fits", "b1");
        catalog.add_file(good.clone(), 18).unwrap();
        catalog.add_file(bad.clone(), 18).unwrap();

        let store = MemoryObjectStore::new("banksia");
        store.reject_key(&bad.key);

        let recorded = catalog
            .delete_and_record(&store, "b1", &[good.key.clone(), bad.key.clone()])
            .await
            .unwrap();
        assert_eq!(recorded.confirmed, vec![good.key.clone()]);
        assert_eq!(recorded.rows_updated, 1);
        assert_eq!(catalog.deleted_filenames().unwrap(), vec![good.filename]);
    }

    #[tokio::test]
    async fn marks_are_idempotent() {
        let catalog = MemoryCatalog::new();
        catalog.add_request(DeleteRequestId(9), None, &[OBS]).unwrap();

        assert_eq!(catalog.mark_observation_deleted(OBS).await.unwrap(), 1);
        assert_eq!(catalog.mark_observation_deleted(OBS).await.unwrap(), 0);
        assert_eq!(
            catalog
                .mark_request_actioned(DeleteRequestId(9))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            catalog
                .mark_request_actioned(DeleteRequestId(9))
                .await
                .unwrap(),
            0
        );
        assert!(catalog.is_request_actioned(DeleteRequestId(9)).unwrap());
    }

    #[tokio::test]
    async fn stage_selection_filters() {
        let catalog = MemoryCatalog::new();
        catalog
            .add_observation(ObsId(100), Some("HW_LFILES"), Some(1))
            .unwrap();
        catalog
            .add_observation(ObsId(200), Some("VOLTAGE_START"), Some(1))
            .unwrap();
        catalog
            .add_observation(ObsId(300), Some("HW_LFILES"), Some(1))
            .unwrap();

        let selection = StageSelectionConfig {
            mode: Some("HW_LFILES".into()),
            dataquality: Some(1),
            before_obs_id: Some(300),
            limit: None,
        };
        assert_eq!(
            catalog.observations_to_stage(&selection).await.unwrap(),
            vec![ObsId(100)]
        );
    }
}
