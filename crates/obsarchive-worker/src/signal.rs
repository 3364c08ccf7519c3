//! OS signal handling.
//!
//! The handler only cancels the shared token; workers notice it at their
//! next dequeue or batch boundary.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn a task that cancels `cancel` on SIGINT (and SIGTERM on Unix).
pub fn spawn_signal_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = shutdown_signal() => {}
        }
        tracing::info!("Interrupted. Shutting down...");
        cancel.cancel();
    })
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listener_exits_when_token_is_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let handle = spawn_signal_listener(token.clone());
        token.cancel();
        handle.await.unwrap();
    }
}
