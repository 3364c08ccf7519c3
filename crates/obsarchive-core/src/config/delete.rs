//! Bulk deletion, validation service and incomplete-upload settings.

use serde::{Deserialize, Serialize};

/// Upper bound imposed by S3 `DeleteObjects`.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Settings for the delete orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteConfig {
    /// Keys per storage delete call. Values above 1000 are capped.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Attempts per storage delete call on transient errors.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Fixed pause between storage delete attempts, in seconds.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_seconds: u64,
    /// Pause after each full batch on ingest-sensitive locations, in seconds.
    #[serde(default = "default_ingest_sleep")]
    pub ingest_sleep_seconds: u64,
}

impl DeleteConfig {
    /// The batch size actually used, clamped to `1..=MAX_DELETE_BATCH`.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_DELETE_BATCH)
    }
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_seconds: default_retry_backoff(),
            ingest_sleep_seconds: default_ingest_sleep(),
        }
    }
}

/// External metadata web services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebServicesConfig {
    /// Base URL; `/validate_obsids` is appended.
    #[serde(default = "default_ws_url")]
    pub url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_ws_timeout")]
    pub timeout_seconds: u64,
}

impl Default for WebServicesConfig {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
            timeout_seconds: default_ws_timeout(),
        }
    }
}

/// Settings for incomplete multipart upload reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncompleteConfig {
    /// Uploads for observations younger than this are left alone.
    #[serde(default = "default_min_age_days")]
    pub min_age_days: i64,
}

impl Default for IncompleteConfig {
    fn default() -> Self {
        Self {
            min_age_days: default_min_age_days(),
        }
    }
}

fn default_batch_size() -> usize {
    MAX_DELETE_BATCH
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    5
}

fn default_ingest_sleep() -> u64 {
    60
}

fn default_ws_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ws_timeout() -> u64 {
    60
}

fn default_min_age_days() -> i64 {
    7
}
