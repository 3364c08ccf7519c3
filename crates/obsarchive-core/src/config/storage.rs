//! Object storage location configuration.

use serde::{Deserialize, Serialize};

/// Credentials and endpoint for one S3-compatible storage location.
///
/// Sections are keyed by location name (`acacia_mwa`, `banksia`, ...), the
/// same names the catalog's location numbers map to.
#[derive(Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Endpoint URL of the S3-compatible service.
    pub endpoint_url: String,
    /// Signing region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Access key.
    pub access_key_id: String,
    /// Secret key.
    pub secret_access_key: String,
    /// Overrides whether bulk deletes are throttled to protect ingest.
    #[serde(default)]
    pub ingest_sensitive: Option<bool>,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl std::fmt::Debug for LocationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("ingest_sensitive", &self.ingest_sensitive)
            .finish()
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_connect_timeout() -> u64 {
    60
}
