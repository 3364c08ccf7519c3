//! # obsarchive-storage
//!
//! Object storage for the archive locations (S3-compatible and in-memory),
//! routing from catalog location numbers to stores, and the client for the
//! tape staging daemon.

pub mod manager;
pub mod providers;
pub mod staging;

pub use manager::{LocationHandle, StorageManager};
pub use staging::{StagingClient, StagingError};
