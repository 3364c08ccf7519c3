//! In-memory object store with call recording and failure injection.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use md5::{Digest, Md5};

use obsarchive_core::error::AppError;
use obsarchive_core::result::AppResult;
use obsarchive_core::traits::{IncompleteUpload, IncompleteUploadStore, ObjectStore};

#[derive(Debug, Default)]
struct State {
    /// (bucket, key) → body.
    objects: BTreeMap<(String, String), Vec<u8>>,
    uploads: Vec<IncompleteUpload>,
    aborted: Vec<IncompleteUpload>,
    delete_calls: Vec<(String, Vec<String>)>,
    rejected: HashSet<String>,
    fail_next: u32,
    fail_transient: bool,
}

/// An object store kept in memory.
///
/// Every `delete_objects` invocation is recorded, including ones made to
/// fail with [`MemoryObjectStore::fail_next_deletes`].
#[derive(Debug)]
pub struct MemoryObjectStore {
    name: String,
    state: Mutex<State>,
}

impl MemoryObjectStore {
    /// Create an empty store named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AppError::internal("Memory object store lock poisoned"))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Store an empty object.
    pub fn put(&self, bucket: &str, key: &str) {
        self.put_with_body(bucket, key, Vec::new());
    }

    /// Store an object with content.
    pub fn put_with_body(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        let body = body.into();
        self.with_state(|s| {
            s.objects
                .insert((bucket.to_string(), key.to_string()), body);
        });
    }

    /// Whether an object exists.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.with_state(|s| {
            s.objects
                .contains_key(&(bucket.to_string(), key.to_string()))
        })
    }

    /// Register an incomplete multipart upload.
    pub fn add_incomplete_upload(&self, upload: IncompleteUpload) {
        self.with_state(|s| s.uploads.push(upload));
    }

    /// Make the next `count` delete calls fail outright. With `transient` the
    /// failure is reported as retryable.
    pub fn fail_next_deletes(&self, count: u32, transient: bool) {
        self.with_state(|s| {
            s.fail_next = count;
            s.fail_transient = transient;
        });
    }

    /// Never confirm deletion of `key`; it stays in the store.
    pub fn reject_key(&self, key: &str) {
        self.with_state(|s| {
            s.rejected.insert(key.to_string());
        });
    }

    /// Every delete call made so far, as (bucket, keys).
    pub fn delete_calls(&self) -> Vec<(String, Vec<String>)> {
        self.with_state(|s| s.delete_calls.clone())
    }

    /// Uploads aborted so far.
    pub fn aborted_uploads(&self) -> Vec<IncompleteUpload> {
        self.with_state(|s| s.aborted.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> AppResult<Vec<String>> {
        let mut state = self.lock()?;
        state
            .delete_calls
            .push((bucket.to_string(), keys.to_vec()));

        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(if state.fail_transient {
                AppError::service_unavailable(format!("{}: injected transient failure", self.name))
            } else {
                AppError::storage(format!("{}: injected failure", self.name))
            });
        }

        let mut confirmed = Vec::with_capacity(keys.len());
        for key in keys {
            if state.rejected.contains(key) {
                continue;
            }
            state.objects.remove(&(bucket.to_string(), key.clone()));
            confirmed.push(key.clone());
        }
        Ok(confirmed)
    }
}

#[async_trait]
impl IncompleteUploadStore for MemoryObjectStore {
    async fn list_buckets(&self) -> AppResult<Vec<String>> {
        let state = self.lock()?;
        let mut buckets: Vec<String> = state
            .objects
            .keys()
            .map(|(b, _)| b.clone())
            .chain(state.uploads.iter().map(|u| u.bucket.clone()))
            .collect();
        buckets.sort();
        buckets.dedup();
        Ok(buckets)
    }

    async fn list_incomplete_uploads(&self, bucket: &str) -> AppResult<Vec<IncompleteUpload>> {
        Ok(self
            .lock()?
            .uploads
            .iter()
            .filter(|u| u.bucket == bucket)
            .cloned()
            .collect())
    }

    async fn object_md5(&self, bucket: &str, key: &str) -> AppResult<Option<String>> {
        Ok(self
            .lock()?
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|body| hex::encode(Md5::digest(body))))
    }

    async fn abort_upload(&self, upload: &IncompleteUpload) -> AppResult<()> {
        let mut state = self.lock()?;
        state.uploads.retain(|u| u.upload_id != upload.upload_id);
        state.aborted.push(upload.clone());
        Ok(())
    }
}
