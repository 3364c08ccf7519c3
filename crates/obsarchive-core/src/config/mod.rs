//! Application configuration schemas.
//!
//! The configuration is deserialized via the `config` crate from the file
//! passed with `--cfg` (format chosen by extension, TOML or INI) and then
//! overlaid with environment variables prefixed with `OBSARCHIVE__`.

pub mod database;
pub mod delete;
pub mod engine;
pub mod logging;
pub mod staging;
pub mod storage;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::delete::{DeleteConfig, IncompleteConfig, MAX_DELETE_BATCH, WebServicesConfig};
pub use self::engine::EngineConfig;
pub use self::logging::LoggingConfig;
pub use self::staging::{StageSelectionConfig, StagingConfig};
pub use self::storage::LocationConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Catalog connection settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Worker pool settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Tape staging daemon settings.
    #[serde(default)]
    pub staging: StagingConfig,
    /// Observation selection for the staging pipeline.
    #[serde(default)]
    pub stage: StageSelectionConfig,
    /// Validation web service.
    #[serde(default)]
    pub webservices: WebServicesConfig,
    /// Bulk deletion settings.
    #[serde(default)]
    pub delete: DeleteConfig,
    /// Incomplete upload reconciliation settings.
    #[serde(default)]
    pub incomplete: IncompleteConfig,
    /// Storage locations keyed by name (e.g. `acacia_mwa`).
    #[serde(default)]
    pub locations: BTreeMap<String, LocationConfig>,
}

impl AppConfig {
    /// Load configuration from `path`, then apply `OBSARCHIVE__` environment
    /// overrides (`OBSARCHIVE__DELETE__BATCH_SIZE=500`).
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("OBSARCHIVE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                AppError::configuration(format!(
                    "Failed to build config from {}: {e}",
                    path.display()
                ))
            })?;

        let cfg: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that cannot drive a run.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.engine.unit_workers == 0 || self.engine.item_workers == 0 {
            return Err(AppError::configuration(
                "engine.unit_workers and engine.item_workers must be at least 1",
            ));
        }
        if self.delete.batch_size == 0 {
            return Err(AppError::configuration("delete.batch_size must be at least 1"));
        }
        for (name, location) in &self.locations {
            if location.endpoint_url.trim().is_empty() {
                return Err(AppError::configuration(format!(
                    "Location {name} has no endpoint_url"
                )));
            }
        }
        Ok(())
    }

    /// Find a location section by name.
    pub fn location(&self, name: &str) -> Result<&LocationConfig, AppError> {
        self.locations
            .get(name)
            .ok_or_else(|| AppError::configuration(format!("No [locations.{name}] section")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_defaults_and_locations() {
        let file = write_config(
            r#"
[database]
url = "postgres://archive@localhost/mwa"

[delete]
batch_size = 250

[locations.acacia_mwa]
endpoint_url = "https://projects.pawsey.org.au"
access_key_id = "key"
secret_access_key = "secret"
ingest_sensitive = true
"#,
        );

        let cfg = AppConfig::load(file.path()).unwrap();
        assert_eq!(cfg.delete.batch_size, 250);
        assert_eq!(cfg.delete.retry_attempts, 3);
        assert_eq!(cfg.engine.unit_workers, 1);
        assert_eq!(cfg.staging.retry_attempts, 3);
        assert_eq!(cfg.incomplete.min_age_days, 7);

        let loc = cfg.location("acacia_mwa").unwrap();
        assert_eq!(loc.ingest_sensitive, Some(true));
        assert_eq!(loc.region, "us-east-1");
        assert!(cfg.location("banksia").is_err());
    }

    #[test]
    fn batch_size_is_capped() {
        let cfg = DeleteConfig {
            batch_size: 5000,
            ..DeleteConfig::default()
        };
        assert_eq!(cfg.effective_batch_size(), MAX_DELETE_BATCH);
    }

    #[test]
    fn zero_workers_are_rejected() {
        let file = write_config(
            r#"
[database]
url = "postgres://localhost/mwa"

[engine]
item_workers = 0
"#,
        );
        let err = AppConfig::load(file.path()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn debug_output_hides_secret() {
        let loc = LocationConfig {
            endpoint_url: "http://banksia".into(),
            region: "us-east-1".into(),
            access_key_id: "key".into(),
            secret_access_key: "hunter2".into(),
            ingest_sensitive: None,
            connect_timeout_seconds: 60,
        };
        assert!(!format!("{loc:?}").contains("hunter2"));
    }
}
