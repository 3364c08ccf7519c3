//! Refresh and stop handlers.

use axum::extract::State;
use axum::http::StatusCode;

use crate::error::ApiError;
use crate::state::ApiState;

/// GET /refresh_obs_list
pub async fn refresh(State(state): State<ApiState>) -> Result<String, ApiError> {
    let added = state.engine.refresh().await?;
    Ok(format!("OK, refreshed. {added} new observations."))
}

/// GET /stop
pub async fn stop(State(state): State<ApiState>) -> &'static str {
    state.engine.stop();
    "OK, stopping"
}

/// Anything else.
pub async fn unknown() -> (StatusCode, &'static str) {
    (StatusCode::BAD_REQUEST, "Bad request")
}
