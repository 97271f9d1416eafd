//! HTTP-level integration tests for the `/output` artifact endpoint:
//! availability gating, traversal defense, HEAD and range semantics.

mod common;

use axum::http::header;
use axum::http::StatusCode;
use common::{
    body_bytes, build_test_app, get, get_with_range, head, poll_until_terminal,
    submit_two_images, EngineBehavior, TestEngine,
};
use uuid::Uuid;

/// Submit a job and wait for its artifact to be ready; returns the model URL.
async fn finished_model_url(test: &common::TestApp) -> String {
    let accepted = submit_two_images(&test.app).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();
    let done = poll_until_terminal(&test.app, &job_id).await;
    done["data"]["model_url"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Test: gating on job state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_job_returns_404() {
    let test = build_test_app(TestEngine::success()).await;

    let response = get(
        test.app.clone(),
        &format!("/api/v1/output/{}/model.obj", Uuid::new_v4()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_job_id_returns_404() {
    let test = build_test_app(TestEngine::success()).await;

    let response = get(test.app.clone(), "/api/v1/output/nope/model.obj").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_artifact_unavailable_while_job_is_running() {
    let (engine, started) = TestEngine::new(EngineBehavior::Hang);
    let test = build_test_app(engine).await;

    let accepted = submit_two_images(&test.app).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();
    started.notified().await;

    // The provisional model URL answers 404 until the job finishes.
    let model_url = accepted["model_url"].as_str().unwrap();
    let response = get(test.app.clone(), model_url).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(
        test.app.clone(),
        &format!("/api/v1/output/{job_id}/anything.obj"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_file_in_finished_job_returns_404() {
    let test = build_test_app(TestEngine::success()).await;

    let accepted = submit_two_images(&test.app).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();
    poll_until_terminal(&test.app, &job_id).await;

    let response = get(
        test.app.clone(),
        &format!("/api/v1/output/{job_id}/other.obj"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: serving
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_artifact_served_with_exact_bytes_and_headers() {
    let test = build_test_app(TestEngine::success()).await;
    let model_url = finished_model_url(&test).await;

    let response = get(test.app.clone(), &model_url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "model/obj"
    );
    assert_eq!(
        response.headers().get(header::ACCEPT_RANGES).unwrap(),
        "bytes"
    );
    assert_eq!(body_bytes(response).await, b"mesh-bytes");
}

#[tokio::test]
async fn test_head_request_returns_headers_without_body() {
    let test = build_test_app(TestEngine::success()).await;
    let model_url = finished_model_url(&test).await;

    let response = head(test.app.clone(), &model_url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_LENGTH).unwrap(),
        &b"mesh-bytes".len().to_string()
    );
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_range_request_returns_partial_content() {
    let test = build_test_app(TestEngine::success()).await;
    let model_url = finished_model_url(&test).await;

    let response = get_with_range(test.app.clone(), &model_url, "bytes=2-5").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 2-5/10"
    );
    assert_eq!(body_bytes(response).await, b"sh-b");
}

#[tokio::test]
async fn test_open_ended_range_runs_to_end_of_file() {
    let test = build_test_app(TestEngine::success()).await;
    let model_url = finished_model_url(&test).await;

    let response = get_with_range(test.app.clone(), &model_url, "bytes=4-").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 4-9/10"
    );
    assert_eq!(body_bytes(response).await, b"-bytes");
}

#[tokio::test]
async fn test_unsatisfiable_range_returns_416() {
    let test = build_test_app(TestEngine::success()).await;
    let model_url = finished_model_url(&test).await;

    let response = get_with_range(test.app.clone(), &model_url, "bytes=100-").await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes */10"
    );
}

// ---------------------------------------------------------------------------
// Test: traversal defense
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_encoded_traversal_is_rejected() {
    let test = build_test_app(TestEngine::success()).await;

    let accepted = submit_two_images(&test.app).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();
    poll_until_terminal(&test.app, &job_id).await;

    // %2F decodes to '/' after routing, so the filename parameter arrives
    // as "../model.obj" and must be rejected before any disk access.
    let response = get(
        test.app.clone(),
        &format!("/api/v1/output/{job_id}/..%2Fmodel.obj"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(
        test.app.clone(),
        &format!("/api/v1/output/{job_id}/%2E%2E"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
