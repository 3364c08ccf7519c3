//! Work queue engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Worker pool bounds and scratch space for the observation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of concurrent observation (unit) workers.
    #[serde(default = "default_unit_workers")]
    pub unit_workers: usize,
    /// Number of concurrent item workers per active observation.
    #[serde(default = "default_item_workers")]
    pub item_workers: usize,
    /// Root of the per-observation scratch directories. Emptied on start-up.
    #[serde(default)]
    pub working_path: Option<PathBuf>,
    /// Bind host for the status endpoints.
    #[serde(default = "default_host")]
    pub web_service_host: String,
    /// Bind port for the status endpoints.
    #[serde(default = "default_port")]
    pub web_service_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unit_workers: default_unit_workers(),
            item_workers: default_item_workers(),
            working_path: None,
            web_service_host: default_host(),
            web_service_port: default_port(),
        }
    }
}

fn default_unit_workers() -> usize {
    1
}

fn default_item_workers() -> usize {
    4
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7900
}
