//! Status handler.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use obsarchive_worker::EngineStatus;

use crate::state::ApiState;

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// One-line summary.
    pub summary: String,
    #[serde(flatten)]
    pub status: EngineStatus,
}

/// GET /status
pub async fn status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let status = state.engine.status();
    Json(StatusResponse {
        summary: status.summary_line(),
        status,
    })
}
