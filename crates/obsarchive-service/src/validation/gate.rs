//! Fail-closed validation of each delete request's observations.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use obsarchive_core::result::AppResult;
use obsarchive_core::types::{DeleteRequestId, ObsId};

use super::ObservationValidator;
use crate::error::DeleteRunError;

/// Runs the validator once per request and aborts the run on any
/// ineligible observation unless `force` was given.
#[derive(Clone)]
pub struct ValidationGate {
    validator: Arc<dyn ObservationValidator>,
    force: bool,
}

impl std::fmt::Debug for ValidationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationGate")
            .field("force", &self.force)
            .finish()
    }
}

impl ValidationGate {
    /// Creates a gate. With `force` ineligible observations only warn.
    pub fn new(validator: Arc<dyn ObservationValidator>, force: bool) -> Self {
        Self { validator, force }
    }

    /// Check the observations of one request.
    pub async fn check(
        &self,
        request_id: DeleteRequestId,
        obs_ids: &[ObsId],
    ) -> Result<(), DeleteRunError> {
        let ineligible = self.validator.validate(obs_ids).await?;
        if ineligible.is_empty() {
            return Ok(());
        }

        if self.force {
            tracing::warn!(
                request_id = %request_id,
                count = ineligible.len(),
                "Found invalid obs_ids in request {}, continuing due to force: {:?}",
                request_id,
                ineligible
            );
            return Ok(());
        }

        tracing::error!(
            request_id = %request_id,
            count = ineligible.len(),
            "Found invalid obs_ids in request {}: {:?}",
            request_id,
            ineligible
        );
        Err(DeleteRunError::Validation {
            request_id,
            ineligible,
        })
    }
}

/// Validator with a fixed set of ineligible observations.
#[derive(Debug, Clone, Default)]
pub struct StaticValidator {
    ineligible: BTreeSet<ObsId>,
}

impl StaticValidator {
    /// Every observation is eligible.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// The given observations are ineligible.
    pub fn rejecting(ids: impl IntoIterator<Item = ObsId>) -> Self {
        Self {
            ineligible: ids.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ObservationValidator for StaticValidator {
    async fn validate(&self, obs_ids: &[ObsId]) -> AppResult<Vec<ObsId>> {
        Ok(obs_ids
            .iter()
            .filter(|id| self.ineligible.contains(id))
            .copied()
            .collect())
    }
}
