//! # obsarchive-core
//!
//! Core crate for the observation archive manager. Contains configuration
//! schemas, typed identifiers, the storage traits, the retry combinator,
//! the batching helper and the unified error system.
//!
//! This crate has **no** internal dependencies on other obsarchive crates.

pub mod config;
pub mod error;
pub mod result;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
