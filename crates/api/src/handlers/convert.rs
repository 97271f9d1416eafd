//! Handlers for the `/convert` resource.
//!
//! Submission stages the uploaded files, registers the job, and dispatches
//! it to the worker pool; the response returns before any conversion work
//! happens. Endpoint latency is bounded by upload I/O, never by inference.

use std::path::PathBuf;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use img2mesh_core::error::CoreError;
use img2mesh_core::job::Job;
use img2mesh_core::paths::upload_basename;
use img2mesh_worker::{QueuedJob, SubmitError};

use crate::error::{AppError, AppResult};
use crate::handlers::parse_job_id;
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field names accepted for input images.
const IMAGE_FIELDS: &[&str] = &["images", "images[]"];

/// Artifact name used for the provisional `model_url` in the submission
/// response. The authoritative URL appears in the status projection once
/// the job finishes, derived from the artifact the engine actually wrote.
const PROVISIONAL_ARTIFACT_NAME: &str = "model.obj";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ConversionAccepted {
    pub job_id: Uuid,
    pub status_url: String,
    pub model_url: String,
}

#[derive(Debug, Serialize)]
pub struct CancelAccepted {
    pub job_id: Uuid,
    pub cancel_requested: bool,
}

// ---------------------------------------------------------------------------
// POST /convert
// ---------------------------------------------------------------------------

/// Submit a conversion job.
///
/// Requires at least one non-empty file under the `images` field; otherwise
/// 400 and nothing is allocated. On success replies 202 with the polling
/// handle. A saturated worker queue yields 429.
pub async fn submit_conversion(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create upload dir: {e}")))?;

    // Job-scoped staging directory. If this function bails out anywhere
    // below, dropping the guard removes everything staged so far.
    let staging = tempfile::Builder::new()
        .prefix("upload-")
        .tempdir_in(&state.config.upload_dir)
        .map_err(|e| AppError::InternalError(format!("Failed to create staging dir: {e}")))?;

    let mut inputs: Vec<PathBuf> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.name() else { continue };
        if !IMAGE_FIELDS.contains(&name) {
            continue;
        }

        let file_name = upload_basename(field.file_name().unwrap_or("upload.bin"));
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if data.is_empty() {
            continue;
        }

        // Index prefix keeps same-named uploads from clobbering each other.
        let dest = staging
            .path()
            .join(format!("{:02}-{}", inputs.len(), file_name));
        tokio::fs::write(&dest, &data)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        inputs.push(dest);
    }

    if inputs.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "At least one non-empty file is required under the 'images' field".to_string(),
        )));
    }

    let id = Uuid::new_v4();
    let output_dir = state.config.output_dir.join(id.to_string());
    tokio::fs::create_dir_all(&output_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create output dir: {e}")))?;

    state
        .registry
        .create(Job::new(id, staging.path().to_path_buf(), output_dir.clone()))
        .await?;

    let input_count = inputs.len();
    let job = QueuedJob::new(id, inputs, output_dir.clone(), staging);

    if let Err(err) = state.pool.submit(job).await {
        // Roll back the registration; dropping the rejected job's staging
        // guard removes the uploaded files.
        state.registry.remove(id).await;
        let _ = tokio::fs::remove_dir_all(&output_dir).await;

        return Err(match err {
            SubmitError::QueueFull(_) => {
                tracing::warn!(job_id = %id, "Submission rejected: queue full");
                AppError::TooManyRequests(
                    "Conversion queue is full, retry later".to_string(),
                )
            }
            SubmitError::Closed(_) => AppError::InternalError(
                "Worker pool is not accepting jobs".to_string(),
            ),
        });
    }

    tracing::info!(job_id = %id, input_count, "Conversion job submitted");

    let response = ConversionAccepted {
        job_id: id,
        status_url: format!("/api/v1/status/{id}"),
        model_url: format!("/api/v1/output/{id}/{PROVISIONAL_ARTIFACT_NAME}"),
    };

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: response })))
}

// ---------------------------------------------------------------------------
// POST /convert/{job_id}/cancel
// ---------------------------------------------------------------------------

/// Request cancellation of a queued or running job.
///
/// Cancellation is asynchronous: 202 means the signal was delivered, and
/// the status endpoint eventually reports the job as `failed`.
pub async fn cancel_conversion(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_job_id(&job_id)?;
    let job = state
        .registry
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {id}")))?;

    if job.status.is_terminal() {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Job is already {}",
            job.status
        ))));
    }

    if !state.pool.cancel(id).await {
        // The token vanishes in the window between the snapshot above and
        // the terminal transition being recorded; treat it as completed.
        return Err(AppError::Core(CoreError::Conflict(
            "Job already completed".to_string(),
        )));
    }

    tracing::info!(job_id = %id, "Cancellation requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: CancelAccepted {
                job_id: id,
                cancel_requested: true,
            },
        }),
    ))
}
