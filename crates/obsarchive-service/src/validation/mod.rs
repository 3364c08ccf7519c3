//! Deletion eligibility checks against the metadata service.

pub mod gate;
pub mod webservice;

use async_trait::async_trait;

use obsarchive_core::result::AppResult;
use obsarchive_core::types::ObsId;

pub use gate::{StaticValidator, ValidationGate};
pub use webservice::WebServiceValidator;

/// Flags observations that must never be bulk-deleted (calibrators,
/// members of an active collection).
#[async_trait]
pub trait ObservationValidator: Send + Sync + 'static {
    /// Return the subset of `obs_ids` that is ineligible for deletion.
    async fn validate(&self, obs_ids: &[ObsId]) -> AppResult<Vec<ObsId>>;
}
