//! Integration tests for the probe endpoints.
//!
//! Most tests drive the full router over the in-memory backend. The tests
//! marked `#[ignore]` talk to real Azure resources and need
//! `STORAGE_BACKEND=azure` plus the matching environment variables.
//! Run them with: cargo test --test integration -- --ignored

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

use resource_probes::api::{create_router, AppState};
use resource_probes::config::{Config, StorageBackend};
use resource_probes::probe::{ProbeExecutor, ProbeName, QUEUE_NAME};
use resource_probes::storage::{MemoryStorage, StorageHandles};

fn memory_app() -> (Router, MemoryStorage) {
    let storage = MemoryStorage::new();
    let handles = StorageHandles::in_memory(storage.clone());
    let app = create_router(AppState::new(ProbeExecutor::new(handles)));
    (app, storage)
}

async fn call(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Value between `<field>=` and the closing parenthesis.
fn field(body: &Value, name: &str) -> String {
    let message = body["message"].as_str().expect("success body has a message");
    let prefix = format!("OK ({name}=");
    assert!(message.starts_with(&prefix), "unexpected message {message}");
    message[prefix.len()..message.len() - 1].to_string()
}

#[tokio::test]
async fn document_create_then_read() {
    let (app, _) = memory_app();

    let (status, body) = call(&app, "/api/v1/cosmosdb/get").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(field(&body, "count"), "0");

    let (status, first) = call(&app, "/api/v1/cosmosdb/create").await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = call(&app, "/api/v1/cosmosdb/create").await;
    assert_ne!(field(&first, "serviceId"), field(&second, "serviceId"));

    let (_, body) = call(&app, "/api/v1/cosmosdb/get").await;
    assert_eq!(field(&body, "count"), "2");
}

#[tokio::test]
async fn blob_create_then_get_returns_written_text() {
    let (app, _) = memory_app();

    let (status, created) = call(&app, "/api/v1/storage/blob/create").await;
    assert_eq!(status, StatusCode::OK);
    let blob_id = field(&created, "blobId");

    let (status, body) = call(&app, &format!("/api/v1/storage/blob/get/{blob_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OK (body=TEST)");

    let (status, body) = call(&app, &format!("/api/v1/storage/blob/lookup?blobId={blob_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OK (body=TEST)");
}

#[tokio::test]
async fn blob_get_for_unwritten_key_is_internal_error() {
    let (app, _) = memory_app();

    let (status, body) = call(&app, "/api/v1/storage/blob/get/does-not-exist").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["title"], "Internal server error");
    assert_eq!(body["detail"], "Missing Blob");

    let (status, _) = call(&app, "/api/v1/storage/blob/lookup?blobId=does-not-exist").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn blob_get_without_key_reports_missing_parameter() {
    let (app, _) = memory_app();

    let (status, body) = call(&app, "/api/v1/storage/blob/get").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], 500);
    assert!(body["detail"].as_str().unwrap().contains("blobId"));
}

#[tokio::test]
async fn blob_lookup_without_key_counts_container() {
    let (app, _) = memory_app();
    for _ in 0..3 {
        call(&app, "/api/v1/storage/blob/create").await;
    }

    let (status, body) = call(&app, "/api/v1/storage/blob/lookup").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(field(&body, "count"), "3");

    let (status, body) = call(&app, "/api/v1/storage/blob/lookup?blobId=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(field(&body, "count"), "3");
}

#[tokio::test]
async fn queue_read_drains_between_invocations() {
    let (app, storage) = memory_app();

    let (status, body) = call(&app, "/api/v1/storage/queue/create").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!field(&body, "messageId").is_empty());

    let (_, body) = call(&app, "/api/v1/storage/queue/get").await;
    assert_eq!(field(&body, "count"), "1");
    assert_eq!(storage.queue_len(QUEUE_NAME), 0);

    let (_, body) = call(&app, "/api/v1/storage/queue/get").await;
    assert_eq!(field(&body, "count"), "0");
}

#[tokio::test]
async fn table_count_matches_creates() {
    let (app, _) = memory_app();
    for _ in 0..4 {
        let (status, body) = call(&app, "/api/v1/storage/table/create").await;
        assert_eq!(status, StatusCode::OK);
        let response: Value = serde_json::from_str(&field(&body, "response")).unwrap();
        assert!(response[".metadata"]["etag"].is_string());
    }

    let (_, body) = call(&app, "/api/v1/storage/table/get").await;
    assert_eq!(field(&body, "response"), "4");
}

#[tokio::test]
async fn concurrent_creates_do_not_collide() {
    let (app, _) = memory_app();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { call(&app, "/api/v1/storage/table/create").await })
        })
        .collect();
    for task in tasks {
        let (status, _) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = call(&app, "/api/v1/storage/table/get").await;
    assert_eq!(field(&body, "response"), "16");
}

// === Live tests ===

fn azure_config() -> Option<Config> {
    dotenvy::dotenv().ok();
    let config = Config::load().ok()?;
    if config.storage_backend != StorageBackend::Azure || config.validate().is_err() {
        return None;
    }
    Some(config)
}

#[tokio::test]
#[ignore = "requires STORAGE_BACKEND=azure"]
async fn live_blob_round_trip() {
    let Some(config) = azure_config() else {
        println!("Skipping: azure backend not configured");
        return;
    };
    let executor = ProbeExecutor::new(StorageHandles::from_config(&config).unwrap());

    let created = executor.run(ProbeName::StorageBlobTestCreate, None).await;
    assert!(created.is_success(), "{}", created.text());
    let blob_id = created
        .text()
        .trim_start_matches("OK (blobId=")
        .trim_end_matches(')')
        .to_string();

    let read = executor.run(ProbeName::StorageBlobTestGet, Some(blob_id)).await;
    assert_eq!(read.text(), "OK (body=TEST)");
}

#[tokio::test]
#[ignore = "requires STORAGE_BACKEND=azure"]
async fn live_every_probe_answers() {
    let Some(config) = azure_config() else {
        println!("Skipping: azure backend not configured");
        return;
    };
    let executor = ProbeExecutor::new(StorageHandles::from_config(&config).unwrap());

    for name in [
        ProbeName::CosmosdbTestCreate,
        ProbeName::CosmosdbTestGet,
        ProbeName::StorageQueueTestCreate,
        ProbeName::StorageQueueTestGet,
        ProbeName::StorageTableTestCreate,
        ProbeName::StorageTableTestGet,
        ProbeName::StorageBlobTestLookup,
    ] {
        let outcome = executor.run(name, None).await;
        println!("{name}: {}", outcome.text());
        assert!(outcome.is_success(), "{name} failed: {}", outcome.text());
    }
}
