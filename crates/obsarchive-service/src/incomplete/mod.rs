//! Cleanup of incomplete multipart uploads.

pub mod reviewer;

pub use reviewer::{IncompleteSummary, IncompleteUploadReviewer};
