//! Handlers for the `/status` resource.
//!
//! A read-only projection of a job record. Idempotent and side-effect
//! free, so clients may poll freely; once a second is plenty, and no
//! minimum interval is enforced server-side. Internal filesystem paths
//! never appear in the projection.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use img2mesh_core::job::{Job, JobStatus};

use crate::error::{AppError, AppResult};
use crate::handlers::parse_job_id;
use crate::response::DataResponse;
use crate::state::AppState;

/// Client-facing job projection.
#[derive(Debug, Serialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    /// Download URL for the artifact; non-null only when finished.
    pub model_url: Option<String>,
    /// Failure message; non-null only when failed.
    pub error: Option<String>,
}

/// GET /api/v1/status/{job_id}
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<JobStatusView>>> {
    let id = parse_job_id(&job_id)?;
    let job = state
        .registry
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {id}")))?;

    Ok(Json(DataResponse {
        data: project(&job),
    }))
}

/// Build the client-facing view of a job record.
///
/// The model URL is derived from the artifact's file name, never from the
/// stored path.
fn project(job: &Job) -> JobStatusView {
    let model_url = match job.status {
        JobStatus::Finished => job
            .artifact_file_name()
            .map(|name| format!("/api/v1/output/{}/{}", job.id, name)),
        _ => None,
    };

    JobStatusView {
        job_id: job.id,
        status: job.status,
        progress: job.progress,
        model_url,
        error: job.error.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
