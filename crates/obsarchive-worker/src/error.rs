//! Stage failures inside the engine.

use thiserror::Error;

use obsarchive_core::error::AppError;

/// A pipeline stage returned an error for one unit.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("prepare failed: {0}")]
    Prepare(#[source] AppError),

    #[error("listing items failed: {0}")]
    ListItems(#[source] AppError),

    #[error("finalize failed: {0}")]
    Finalize(#[source] AppError),
}

impl PipelineError {
    /// The stage's own error.
    pub fn inner(&self) -> &AppError {
        match self {
            Self::Prepare(e) | Self::ListItems(e) | Self::Finalize(e) => e,
        }
    }

    /// The stage gave up because shutdown was requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner().is_cancelled()
    }

    /// Stage name for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Prepare(_) => "prepare",
            Self::ListItems(_) => "list_items",
            Self::Finalize(_) => "finalize",
        }
    }
}
