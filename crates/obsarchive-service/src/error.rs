//! Errors surfaced by a delete run.

use thiserror::Error;

use obsarchive_core::error::{AppError, ErrorKind};
use obsarchive_core::types::{DeleteRequestId, ObsId};

/// Why a delete run stopped.
#[derive(Debug, Error)]
pub enum DeleteRunError {
    /// The validation service flagged observations and no override was
    /// given. Nothing was deleted.
    #[error(
        "Delete request {request_id} contains {} observations that cannot be deleted: {}",
        ineligible.len(),
        join_ids(ineligible)
    )]
    Validation {
        request_id: DeleteRequestId,
        ineligible: Vec<ObsId>,
    },

    #[error(transparent)]
    App(#[from] AppError),
}

fn join_ids(ids: &[ObsId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<DeleteRunError> for AppError {
    fn from(err: DeleteRunError) -> Self {
        match err {
            DeleteRunError::App(e) => e,
            other => AppError::new(ErrorKind::Validation, other.to_string()),
        }
    }
}
