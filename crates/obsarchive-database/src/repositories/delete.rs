//! Delete request and data file repository.

use async_trait::async_trait;
use sqlx::PgPool;

use obsarchive_core::error::{AppError, ErrorKind};
use obsarchive_core::result::AppResult;
use obsarchive_core::traits::ObjectStore;
use obsarchive_core::types::{DeleteRequestId, ObsId};
use obsarchive_entity::file::model::filename_of;
use obsarchive_entity::file::{DataFile, FileType};
use obsarchive_entity::request::{DeleteRequest, FileScope};

use crate::catalog::{DeleteCatalog, RecordedDeletion};

/// Catalog access for bulk deletion and reconciliation.
#[derive(Debug, Clone)]
pub struct DeleteRepository {
    pool: PgPool,
}

impl DeleteRepository {
    /// Create a new delete repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Split confirmed keys into bare filenames and the distinct observation
/// ids their names start with.
///
/// A filename without a leading observation id still counts as deleted in
/// storage, but its catalog row cannot be matched and is left as it was.
pub(crate) fn confirmed_filenames(confirmed: &[String]) -> (Vec<String>, Vec<ObsId>) {
    let filenames: Vec<String> = confirmed
        .iter()
        .map(|key| filename_of(key).to_string())
        .collect();
    let mut obs_ids = Vec::with_capacity(filenames.len());
    let mut unmatched = Vec::new();
    for filename in &filenames {
        match ObsId::from_filename(filename) {
            Some(obs) => obs_ids.push(obs),
            None => unmatched.push(filename.as_str()),
        }
    }
    if !unmatched.is_empty() {
        tracing::warn!(
            "{} deleted files have no observation id in their name and stay undeleted in the catalog: {}",
            unmatched.len(),
            unmatched.join(", ")
        );
    }
    obs_ids.sort_unstable();
    obs_ids.dedup();
    (filenames, obs_ids)
}

#[async_trait]
impl DeleteCatalog for DeleteRepository {
    async fn eligible_requests(
        &self,
        ids: Option<&[DeleteRequestId]>,
    ) -> AppResult<Vec<DeleteRequest>> {
        sqlx::query_as::<_, DeleteRequest>(
            "SELECT id, filetype_id, created_datetime, approved_datetime, \
             cancelled_datetime, actioned_datetime \
             FROM deletion_requests \
             WHERE cancelled_datetime IS NULL \
             AND actioned_datetime IS NULL \
             AND approved_datetime IS NOT NULL \
             AND ($1::bigint[] IS NULL OR id = ANY($1)) \
             ORDER BY created_datetime",
        )
        .bind(ids.map(|ids| ids.to_vec()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to fetch delete requests", e)
        })
    }

    async fn request_filetype(&self, request: DeleteRequestId) -> AppResult<Option<i32>> {
        let row: Option<Option<i32>> =
            sqlx::query_scalar("SELECT filetype_id FROM deletion_requests WHERE id = $1")
                .bind(request)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Database,
                        "Failed to fetch delete request filetype",
                        e,
                    )
                })?;

        row.ok_or_else(|| AppError::not_found(format!("Delete request {request} not found")))
    }

    async fn request_observations(&self, request: DeleteRequestId) -> AppResult<Vec<ObsId>> {
        sqlx::query_scalar::<_, ObsId>(
            "SELECT obs_id FROM deletion_request_observation \
             WHERE request_id = $1 ORDER BY obs_id",
        )
        .bind(request)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                "Failed to fetch delete request observations",
                e,
            )
        })
    }

    async fn undeleted_files(&self, obs: ObsId, scope: FileScope) -> AppResult<Vec<DataFile>> {
        let filetype = match scope {
            FileScope::WholeObservation => None,
            FileScope::FileType(id) => Some(id),
        };

        sqlx::query_as::<_, DataFile>(
            "SELECT observation_num, filename, location, bucket, \
             CONCAT_WS('', folder, filename) AS key \
             FROM data_files \
             WHERE observation_num = $1 \
             AND remote_archived = TRUE \
             AND deleted_timestamp IS NULL \
             AND (($2::int IS NULL AND filetype <> $3) OR filetype = $2) \
             ORDER BY filename",
        )
        .bind(obs)
        .bind(filetype)
        .bind(FileType::Ppd.id())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to fetch undeleted files", e)
        })
    }

    async fn delete_and_record(
        &self,
        store: &dyn ObjectStore,
        bucket: &str,
        keys: &[String],
    ) -> AppResult<RecordedDeletion> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let confirmed = match store.delete_objects(bucket, keys).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::error!("Rollback after failed storage delete also failed: {}", rb);
                }
                return Err(e);
            }
        };

        let (filenames, obs_ids) = confirmed_filenames(&confirmed);
        let rows_updated = if filenames.is_empty() {
            0
        } else {
            sqlx::query(
                "UPDATE data_files SET deleted_timestamp = NOW(), deleted = TRUE \
                 WHERE deleted_timestamp IS NULL \
                 AND filename = ANY($1) \
                 AND observation_num = ANY($2)",
            )
            .bind(&filenames)
            .bind(&obs_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to record deleted files", e)
            })?
            .rows_affected()
        };

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit deleted files", e)
        })?;

        Ok(RecordedDeletion {
            confirmed,
            rows_updated,
        })
    }

    async fn mark_observation_deleted(&self, obs: ObsId) -> AppResult<u64> {
        sqlx::query(
            "UPDATE mwa_setting SET deleted_timestamp = NOW(), deleted = TRUE \
             WHERE deleted_timestamp IS NULL AND starttime = $1",
        )
        .bind(obs)
        .execute(&self.pool)
        .await
        .map(|r| r.rows_affected())
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to mark observation deleted", e)
        })
    }

    async fn mark_request_actioned(&self, request: DeleteRequestId) -> AppResult<u64> {
        sqlx::query(
            "UPDATE deletion_requests SET actioned_datetime = NOW() \
             WHERE actioned_datetime IS NULL AND id = $1",
        )
        .bind(request)
        .execute(&self.pool)
        .await
        .map(|r| r.rows_affected())
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to mark request actioned", e)
        })
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
        }
    }
}
