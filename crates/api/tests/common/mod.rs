//! Shared helpers for HTTP-level integration tests.
//!
//! Mirrors the router construction in `main.rs` so tests exercise the same
//! middleware stack (CORS, request ID, timeout, panic recovery) that
//! production uses, with the conversion engine replaced by a stub.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::Notify;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use img2mesh_api::config::ServerConfig;
use img2mesh_api::routes;
use img2mesh_api::state::AppState;
use img2mesh_core::registry::JobRegistry;
use img2mesh_engine::{ConversionEngine, EngineError, ProgressFn};
use img2mesh_worker::{PoolHandle, WorkerPool};

// ---------------------------------------------------------------------------
// Stub engine
// ---------------------------------------------------------------------------

pub enum EngineBehavior {
    /// Write `model.obj` containing `mesh-bytes` and succeed.
    Success,
    /// Fail with a fixed diagnostic.
    Fail,
    /// Block until aborted.
    Hang,
}

pub struct TestEngine {
    behavior: EngineBehavior,
    started: Arc<Notify>,
}

impl TestEngine {
    pub fn new(behavior: EngineBehavior) -> (Arc<dyn ConversionEngine>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let engine = Arc::new(Self {
            behavior,
            started: Arc::clone(&started),
        });
        (engine, started)
    }

    pub fn success() -> Arc<dyn ConversionEngine> {
        Self::new(EngineBehavior::Success).0
    }

    pub fn failing() -> Arc<dyn ConversionEngine> {
        Self::new(EngineBehavior::Fail).0
    }
}

#[async_trait]
impl ConversionEngine for TestEngine {
    async fn convert(
        &self,
        _inputs: &[PathBuf],
        output_dir: &Path,
        progress: ProgressFn,
    ) -> Result<PathBuf, EngineError> {
        self.started.notify_one();
        match self.behavior {
            EngineBehavior::Success => {
                progress(50);
                let path = output_dir.join("model.obj");
                tokio::fs::write(&path, b"mesh-bytes").await?;
                Ok(path)
            }
            EngineBehavior::Fail => Err(EngineError::Failed("no mesh decoded".to_string())),
            EngineBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EngineError::Failed("hang elapsed".to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// A fully wired application plus handles for observing internal state.
pub struct TestApp {
    pub app: Router,
    pub registry: Arc<JobRegistry>,
    pub pool: PoolHandle,
    _storage: tempfile::TempDir,
}

/// Build a test `ServerConfig` rooted at a scratch storage directory.
pub fn test_config(storage_root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        upload_dir: storage_root.join("uploads"),
        output_dir: storage_root.join("output"),
        worker_count: 2,
        job_queue_depth: 8,
        job_timeout_secs: 5,
        max_upload_bytes: 10 * 1024 * 1024,
        engine_cmd: "true".to_string(),
        engine_args: Vec::new(),
    }
}

/// Build the application with the default test config.
pub async fn build_test_app(engine: Arc<dyn ConversionEngine>) -> TestApp {
    build_test_app_with(engine, |_| {}).await
}

/// Build the application, letting the caller tweak the config first.
pub async fn build_test_app_with(
    engine: Arc<dyn ConversionEngine>,
    adjust: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let storage = tempfile::tempdir().expect("create storage root");
    let mut config = test_config(storage.path());
    adjust(&mut config);

    let registry = Arc::new(JobRegistry::new());
    let pool = WorkerPool::start(Arc::clone(&registry), engine, config.pool_config());

    let state = AppState {
        registry: Arc::clone(&registry),
        pool: pool.clone(),
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::HEAD])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes(config.max_upload_bytes))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        app,
        registry,
        pool,
        _storage: storage,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub const BOUNDARY: &str = "img2mesh-test-boundary";

/// Build a multipart body from `(field_name, file_name, bytes)` parts.
pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, bytes) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                 name=\"{name}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn get(app: Router, path: &str) -> Response<axum::body::Body> {
    app.oneshot(
        Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn get_with_range(app: Router, path: &str, range: &str) -> Response<axum::body::Body> {
    app.oneshot(
        Request::builder()
            .uri(path)
            .header(axum::http::header::RANGE, range)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn head(app: Router, path: &str) -> Response<axum::body::Body> {
    app.oneshot(
        Request::builder()
            .method(Method::HEAD)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post(app: Router, path: &str) -> Response<axum::body::Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_multipart(
    app: Router,
    path: &str,
    parts: &[(&str, &str, &[u8])],
) -> Response<axum::body::Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_bytes(response: Response<axum::body::Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<axum::body::Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Polling helpers
// ---------------------------------------------------------------------------

/// Poll the status endpoint until the job reaches a terminal state,
/// returning the final response body.
pub async fn poll_until_terminal(app: &Router, job_id: &str) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let response = get(app.clone(), &format!("/api/v1/status/{job_id}")).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            let status = json["data"]["status"].as_str().unwrap().to_string();
            if status == "finished" || status == "failed" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not reach a terminal state in time")
}

/// Submit a standard two-image conversion and return the `data` payload.
pub async fn submit_two_images(app: &Router) -> serde_json::Value {
    let response = post_multipart(
        app.clone(),
        "/api/v1/convert",
        &[
            ("images", "front.jpg", b"jpeg-front".as_slice()),
            ("images", "side.jpg", b"jpeg-side".as_slice()),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let mut json = body_json(response).await;
    json["data"].take()
}
