//! # obsarchive-database
//!
//! Connection management for the metadata catalog, the catalog contracts
//! used by the pipelines, their PostgreSQL implementations, and an
//! in-memory catalog for exercising the pipelines without a database.

pub mod catalog;
pub mod connection;
pub mod memory;
pub mod repositories;

pub use catalog::{DeleteCatalog, ObservationCatalog, RecordedDeletion};
pub use connection::DatabasePool;
pub use memory::MemoryCatalog;
pub use repositories::{DeleteRepository, ObservationRepository};
