//! Serving the status endpoints until shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use obsarchive_core::error::{AppError, ErrorKind};
use obsarchive_core::result::AppResult;
use obsarchive_worker::EngineControl;

use crate::router::build_router;
use crate::state::ApiState;

/// Serve the status endpoints on `host:port` until `cancel` fires.
pub async fn serve(
    host: &str,
    port: u16,
    engine: Arc<dyn EngineControl>,
    cancel: CancellationToken,
) -> AppResult<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(ErrorKind::Configuration, format!("Failed to bind {addr}"), e)
    })?;
    tracing::info!("Status endpoints listening on {}", addr);

    axum::serve(listener, build_router(ApiState::new(engine)))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| AppError::internal(format!("Status server error: {e}")))?;

    tracing::debug!("Status endpoints stopped");
    Ok(())
}
