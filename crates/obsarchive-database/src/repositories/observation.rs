//! Observation and file lookups for staging and upload reconciliation.

use async_trait::async_trait;
use sqlx::PgPool;

use obsarchive_core::config::StageSelectionConfig;
use obsarchive_core::error::{AppError, ErrorKind};
use obsarchive_core::result::AppResult;
use obsarchive_core::types::ObsId;
use obsarchive_entity::file::DataFile;

use crate::catalog::ObservationCatalog;

/// Read-only catalog access for the staging pipeline.
#[derive(Debug, Clone)]
pub struct ObservationRepository {
    pool: PgPool,
}

impl ObservationRepository {
    /// Create a new observation repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObservationCatalog for ObservationRepository {
    async fn observations_to_stage(
        &self,
        selection: &StageSelectionConfig,
    ) -> AppResult<Vec<ObsId>> {
        sqlx::query_scalar::<_, ObsId>(
            "SELECT starttime FROM mwa_setting \
             WHERE deleted_timestamp IS NULL \
             AND ($1::text IS NULL OR mode = $1) \
             AND ($2::int IS NULL OR dataquality = $2) \
             AND ($3::bigint IS NULL OR starttime < $3) \
             ORDER BY starttime \
             LIMIT $4",
        )
        .bind(selection.mode.as_deref())
        .bind(selection.dataquality)
        .bind(selection.before_obs_id)
        .bind(selection.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to fetch observations to stage", e)
        })
    }

    async fn observation_files(&self, obs: ObsId) -> AppResult<Vec<DataFile>> {
        sqlx::query_as::<_, DataFile>(
            "SELECT observation_num, filename, location, bucket, \
             CONCAT_WS('', folder, filename) AS key \
             FROM data_files \
             WHERE observation_num = $1 \
             AND remote_archived = TRUE \
             AND deleted_timestamp IS NULL \
             ORDER BY filename",
        )
        .bind(obs)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to fetch observation files", e)
        })
    }

    async fn file_checksum(&self, obs: ObsId, filename: &str) -> AppResult<Option<String>> {
        let row: Option<Option<String>> = sqlx::query_scalar(
            "SELECT checksum FROM data_files WHERE filename = $1 AND observation_num = $2",
        )
        .bind(filename)
        .bind(obs)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to fetch file checksum", e)
        })?;
        Ok(row.flatten())
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
        }
    }
}
