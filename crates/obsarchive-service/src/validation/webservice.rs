//! HTTP client for `POST /validate_obsids`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use obsarchive_core::config::WebServicesConfig;
use obsarchive_core::error::{AppError, ErrorKind};
use obsarchive_core::result::AppResult;
use obsarchive_core::types::ObsId;

use super::ObservationValidator;

#[derive(Serialize)]
struct ValidateRequest<'a> {
    obsids: &'a [ObsId],
    with_reasons: bool,
}

/// Validator backed by the metadata web service.
#[derive(Debug, Clone)]
pub struct WebServiceValidator {
    client: reqwest::Client,
    endpoint: String,
}

impl WebServiceValidator {
    /// Build a client for the `[webservices]` section.
    pub fn new(config: &WebServicesConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/validate_obsids", config.url.trim_end_matches('/')),
        })
    }

    /// The full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ObservationValidator for WebServiceValidator {
    async fn validate(&self, obs_ids: &[ObsId]) -> AppResult<Vec<ObsId>> {
        if obs_ids.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(count = obs_ids.len(), endpoint = %self.endpoint, "Validating observations");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ValidateRequest {
                obsids: obs_ids,
                with_reasons: false,
            })
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Validation request to {} failed", self.endpoint),
                    e,
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(format!(
                "Validation service returned {status}: {body}"
            )));
        }

        response.json::<Vec<ObsId>>().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Serialization,
                "Validation service returned an unexpected body",
                e,
            )
        })
    }
}
