//! Object storage traits for S3-compatible archive locations.

use async_trait::async_trait;

use crate::result::AppResult;

/// Bulk deletion against one storage location.
///
/// Implemented in `obsarchive-storage` for S3-compatible services and for
/// an in-memory store used in tests.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug + 'static {
    /// Human-readable location name (e.g. `"banksia"`).
    fn name(&self) -> &str;

    /// Delete `keys` from `bucket` in a single call and return the keys the
    /// backend confirmed as deleted.
    ///
    /// A key that does not exist counts as deleted. Callers never pass more
    /// than [`crate::config::MAX_DELETE_BATCH`] keys. Errors that a retry may
    /// fix are reported with [`crate::error::ErrorKind::ServiceUnavailable`].
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> AppResult<Vec<String>>;
}

/// A multipart upload that was started but never completed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IncompleteUpload {
    /// Bucket holding the upload.
    pub bucket: String,
    /// Object key the upload targets.
    pub key: String,
    /// Backend-assigned upload id.
    pub upload_id: String,
    /// When the upload was initiated, if reported.
    pub initiated: Option<chrono::DateTime<chrono::Utc>>,
}

impl IncompleteUpload {
    /// The bare filename: everything after the last `/` of the key.
    pub fn filename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Inspection and cleanup of incomplete multipart uploads.
#[async_trait]
pub trait IncompleteUploadStore: Send + Sync + std::fmt::Debug + 'static {
    /// List every bucket on the location.
    async fn list_buckets(&self) -> AppResult<Vec<String>>;

    /// List incomplete multipart uploads in `bucket`.
    async fn list_incomplete_uploads(&self, bucket: &str) -> AppResult<Vec<IncompleteUpload>>;

    /// Download the completed object at `bucket/key` and return its MD5 as
    /// lowercase hex, or `None` when no completed object exists.
    async fn object_md5(&self, bucket: &str, key: &str) -> AppResult<Option<String>>;

    /// Abort the incomplete upload, discarding its parts.
    async fn abort_upload(&self, upload: &IncompleteUpload) -> AppResult<()>;
}
