//! Storage manager: routes catalog location numbers to object stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use obsarchive_core::error::AppError;
use obsarchive_core::result::AppResult;
use obsarchive_core::traits::ObjectStore;
use obsarchive_entity::file::StorageLocation;

/// A registered location.
#[derive(Debug, Clone)]
pub struct LocationHandle {
    /// Store for the location.
    pub store: Arc<dyn ObjectStore>,
    /// Whether bulk deletes are paced on this location.
    pub ingest_sensitive: bool,
}

/// Holds one object store per configured storage location.
#[derive(Debug, Clone, Default)]
pub struct StorageManager {
    locations: BTreeMap<StorageLocation, LocationHandle>,
}

impl StorageManager {
    /// Create a new empty storage manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect an S3 store for every `[locations.*]` section.
    #[cfg(feature = "s3")]
    pub async fn from_config(config: &obsarchive_core::config::AppConfig) -> AppResult<Self> {
        let mut manager = Self::new();
        for (name, section) in &config.locations {
            let location: StorageLocation = name.parse().map_err(AppError::configuration)?;
            let store = crate::providers::S3ObjectStore::connect(name, section).await?;
            let ingest_sensitive = section
                .ingest_sensitive
                .unwrap_or_else(|| location.is_ingest_sensitive());
            manager.register(location, Arc::new(store), ingest_sensitive);
        }
        Ok(manager)
    }

    /// Register (or replace) the store for a location.
    pub fn register(
        &mut self,
        location: StorageLocation,
        store: Arc<dyn ObjectStore>,
        ingest_sensitive: bool,
    ) {
        self.locations.insert(
            location,
            LocationHandle {
                store,
                ingest_sensitive,
            },
        );
    }

    /// Resolve a catalog location number.
    pub fn resolve(&self, location_id: i32) -> AppResult<(StorageLocation, &LocationHandle)> {
        let location = StorageLocation::from_id(location_id).ok_or_else(|| {
            AppError::configuration(format!("Invalid location found: {location_id}"))
        })?;
        let handle = self.locations.get(&location).ok_or_else(|| {
            AppError::configuration(format!(
                "Location {location} is referenced by the catalog but not configured"
            ))
        })?;
        Ok((location, handle))
    }

    /// Registered locations.
    pub fn locations(&self) -> impl Iterator<Item = StorageLocation> + '_ {
        self.locations.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryObjectStore;

    #[test]
    fn resolves_registered_locations() {
        let mut manager = StorageManager::new();
        manager.register(
            StorageLocation::Banksia,
            Arc::new(MemoryObjectStore::new("banksia")),
            false,
        );

        let (location, handle) = manager.resolve(3).unwrap();
        assert_eq!(location, StorageLocation::Banksia);
        assert_eq!(handle.store.name(), "banksia");
        assert!(!handle.ingest_sensitive);
    }

    #[test]
    fn unknown_or_unconfigured_location_is_an_error() {
        let manager = StorageManager::new();
        let err = manager.resolve(99).unwrap_err();
        assert!(err.message.contains("Invalid location found"));
        assert!(manager.resolve(4).is_err());
    }
}
