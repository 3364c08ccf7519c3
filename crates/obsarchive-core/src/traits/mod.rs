//! Core traits defined in `obsarchive-core` and implemented by other crates.

pub mod storage;

pub use storage::{IncompleteUpload, IncompleteUploadStore, ObjectStore};
