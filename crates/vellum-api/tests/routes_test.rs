//! Integration tests for the HTTP routes, exercised through the router with
//! a mock repository and mock external clients (no database required).

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use vellum_api::AppState;
use vellum_api::routes::create_router;
use vellum_chunker::MarkdownChunker;
use vellum_clients::{MockBlobStore, MockEmbeddingClient, MockParserClient};
use vellum_data::{MockRepository, Stage};
use vellum_worker::{Worker, WorkerConfig, WorkerContext};

const NS: uuid::Uuid = uuid::uuid!("7d9f9e2a-4c1b-4a3e-9f6d-2b8c5e1a7d3f");

fn test_state() -> AppState {
    let repo = Arc::new(MockRepository::new(NS));
    let ctx = WorkerContext {
        repo: Arc::clone(&repo) as Arc<dyn vellum_data::Repository>,
        blob_store: Arc::new(MockBlobStore::new()),
        parser: Arc::new(MockParserClient::new("# Title\nbody")),
        embedder: Arc::new(MockEmbeddingClient::new(4)),
        chunker: MarkdownChunker::default(),
        chunker_name: "markdown-simple".to_string(),
        chunker_version: "1".to_string(),
        embed_model: "text-embedding-3-small".to_string(),
        embed_version: "1".to_string(),
        terminal_stage: Stage::Embedded,
    };
    let config = WorkerConfig {
        poll_interval: Duration::from_millis(1),
        max_retries: 3,
        retry_base_delay: Duration::from_millis(1),
        circuit_failure_threshold: 5,
        circuit_recovery_timeout: Duration::from_secs(60),
    };
    let worker = Arc::new(Worker::new("test-worker", ctx, config));
    AppState::new(repo as Arc<dyn vellum_data::Repository>, worker, NS, 50 * 1024 * 1024)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn intake_then_job_lookup_round_trips() {
    let app = create_router(test_state());

    let request = Request::builder()
        .method("POST")
        .uri("/documents")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "user_id": "u1",
                "filename": "report.pdf",
                "mime": "application/pdf",
                "byte_length": 1234,
                "content_hash": "a".repeat(64),
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let intake_body = body_json(response).await;
    let job_id = intake_body["job_id"].as_str().unwrap();

    let job_request = Request::builder()
        .method("GET")
        .uri(format!("/jobs/{job_id}"))
        .body(Body::empty())
        .unwrap();

    let job_response = app.oneshot(job_request).await.unwrap();
    assert_eq!(job_response.status(), StatusCode::OK);
    let job_body = body_json(job_response).await;
    assert_eq!(job_body["job_id"], job_id);
    assert_eq!(job_body["stage"], "job_validated");
    assert_eq!(job_body["state"], "queued");
}

#[tokio::test]
async fn intake_rejects_a_non_pdf_mime() {
    let app = create_router(test_state());

    let request = Request::builder()
        .method("POST")
        .uri("/documents")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "user_id": "u1",
                "filename": "report.txt",
                "mime": "text/plain",
                "byte_length": 10,
                "content_hash": "b".repeat(64),
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "invalid_mime");
}

#[tokio::test]
async fn job_lookup_returns_not_found_for_an_unknown_id() {
    let app = create_router(test_state());

    let request = Request::builder()
        .method("GET")
        .uri(format!("/jobs/{}", uuid::Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_ok_with_every_mock_component_up() {
    let app = create_router(test_state());

    let request = Request::builder().method("GET").uri("/health").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}
