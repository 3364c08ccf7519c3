//! The staging pipeline on the engine, observed through the status endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use obsarchive_api::{ApiState, build_router};
use obsarchive_core::config::{StageSelectionConfig, StagingConfig};
use obsarchive_core::retry::RetryPolicy;
use obsarchive_core::types::ObsId;
use obsarchive_database::MemoryCatalog;
use obsarchive_entity::file::{DataFile, FileType};
use obsarchive_service::StagePipeline;
use obsarchive_storage::StagingClient;
use obsarchive_worker::{EngineControl, EngineSettings, WorkQueueEngine};

/// Staging daemon that accepts every request.
async fn daemon() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut len = [0u8; 4];
            if socket.read_exact(&mut len).await.is_err() {
                continue;
            }
            let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
            let _ = socket.read_exact(&mut payload).await;
            let _ = socket.write_all(&0u16.to_be_bytes()).await;
        }
    });
    port
}

async fn get(control: Arc<dyn EngineControl>, uri: &str) -> (StatusCode, String) {
    let response = build_router(ApiState::new(control))
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
async fn staged_observations_show_up_in_status() {
    let staged = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    let catalog = Arc::new(MemoryCatalog::new());
    for obs in [1_300_000_000, 1_300_000_008] {
        let obs = ObsId(obs);
        catalog.add_observation(obs, Some("MWAX_CORRELATOR"), Some(1)).unwrap();
        for ch in 1..=3 {
            let name = format!("{obs}_ch{ch:02}.fits");
            std::fs::write(staged.path().join(&name), b"vis").unwrap();
            catalog
                .add_file(
                    DataFile::new(obs, name, 3, "mwa01fs", None),
                    FileType::MwaxVisibilities.id(),
                )
                .unwrap();
        }
    }

    let staging = StagingClient::new(&StagingConfig {
        host: "127.0.0.1".into(),
        port: daemon().await,
        ..StagingConfig::default()
    })
    .with_policy(RetryPolicy {
        max_attempts: 1,
        backoff: Duration::from_millis(1),
    });
    let pipeline = Arc::new(StagePipeline::new(
        catalog,
        staging,
        StageSelectionConfig::default(),
        staged.path(),
    ));
    let engine = WorkQueueEngine::new(
        pipeline.clone(),
        EngineSettings {
            unit_workers: 2,
            item_workers: 2,
            working_path: Some(work.path().join("scratch")),
        },
        CancellationToken::new(),
    );

    let stats = engine.run().await.unwrap();
    assert_eq!(stats.succeeded, 2);
    assert!(pipeline.reports().values().all(|r| r.copied == 3));

    let control: Arc<dyn EngineControl> = Arc::new(engine.clone());
    let (code, body) = get(control.clone(), "/status").await;
    assert_eq!(code, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["queued"], 0);
    assert_eq!(json["stats"]["to_process"], 2);
    assert_eq!(json["stats"]["succeeded"], 2);
    assert_eq!(json["processing"].as_array().map(Vec::len), Some(0));

    let (code, body) = get(control.clone(), "/stop").await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, "OK, stopping");
    assert!(engine.cancel_token().is_cancelled());

    let (_, body) = get(control, "/refresh_obs_list").await;
    assert!(body.contains(" 0 new observations"));

    let stats = engine.shutdown().await;
    assert!(stats.is_balanced(engine.pending() as u64));
}
