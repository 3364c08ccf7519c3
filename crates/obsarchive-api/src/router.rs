//! Route definitions.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::ApiState;

/// Build the status router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handlers::status::status))
        .route("/refresh_obs_list", get(handlers::control::refresh))
        .route("/stop", get(handlers::control::stop))
        .fallback(handlers::control::unknown)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use obsarchive_core::result::AppResult;
    use obsarchive_worker::{EngineControl, EngineStatus, StatsSnapshot, UnitStatus};

    #[derive(Default)]
    struct FakeEngine {
        refreshes: AtomicUsize,
        stopped: AtomicBool,
    }

    #[async_trait]
    impl EngineControl for FakeEngine {
        fn status(&self) -> EngineStatus {
            EngineStatus {
                pipeline: "stage".into(),
                unit_workers: 2,
                item_workers: 4,
                queued: 3,
                processing: vec![UnitStatus {
                    unit: "1300000000".into(),
                    items_total: 24,
                    items_done: 10,
                    in_progress: vec!["1300000000_ch01.fits".into()],
                }],
                stopping: self.stopped.load(Ordering::SeqCst),
                stats: StatsSnapshot {
                    to_process: 5,
                    ..StatsSnapshot::default()
                },
            }
        }

        async fn refresh(&self) -> AppResult<usize> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(2)
        }

        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    async fn get(engine: Arc<FakeEngine>, uri: &str) -> (StatusCode, String) {
        let router = build_router(ApiState::new(engine));
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn status_reports_queue_and_claimed_units() {
        let (code, body) = get(Arc::new(FakeEngine::default()), "/status").await;
        assert_eq!(code, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["queued"], 3);
        assert_eq!(json["processing"][0]["unit"], "1300000000");
        assert_eq!(json["stats"]["to_process"], 5);
        assert_eq!(
            json["summary"],
            "Running 2 tasks. Observations remaining: 3/5 Processing: [1300000000]"
        );
    }

    #[tokio::test]
    async fn refresh_runs_discovery() {
        let engine = Arc::new(FakeEngine::default());
        let (code, body) = get(engine.clone(), "/refresh_obs_list").await;
        assert_eq!(code, StatusCode::OK);
        assert!(body.contains("2 new observations"));
        assert_eq!(engine.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_flips_the_engine() {
        let engine = Arc::new(FakeEngine::default());
        let (code, body) = get(engine.clone(), "/stop").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body, "OK, stopping");
        assert!(engine.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unknown_path_is_bad_request() {
        let (code, _) = get(Arc::new(FakeEngine::default()), "/nope").await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }
}
