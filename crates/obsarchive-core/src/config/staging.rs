//! Tape staging daemon and staging pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Connection and retry settings for the tape staging daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Staging daemon host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Staging daemon port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of staging attempts per observation.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Fixed pause between staging attempts, in seconds.
    #[serde(default = "default_backoff")]
    pub backoff_seconds: u64,
    /// How long to wait for the daemon's status reply. Recalls from tape are slow.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_seconds: u64,
    /// Directory where recalled files become readable.
    #[serde(default = "default_staged_root")]
    pub staged_root: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            retry_attempts: default_retry_attempts(),
            backoff_seconds: default_backoff(),
            read_timeout_seconds: default_read_timeout(),
            staged_root: default_staged_root(),
        }
    }
}

/// Observation selection for the long-running staging pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSelectionConfig {
    /// Only observations recorded in this mode (e.g. `HW_LFILES`).
    #[serde(default)]
    pub mode: Option<String>,
    /// Only observations with this data quality id.
    #[serde(default)]
    pub dataquality: Option<i32>,
    /// Only observations strictly older than this obs id.
    #[serde(default)]
    pub before_obs_id: Option<i64>,
    /// Upper bound on the number of observations discovered per refresh.
    #[serde(default)]
    pub limit: Option<i64>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9898
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    4500
}

fn default_staged_root() -> PathBuf {
    PathBuf::from("/staged")
}
