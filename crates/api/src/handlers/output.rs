//! Handlers for the `/output` resource.
//!
//! Streams a finished job's artifacts with HTTP range request support, so
//! a 3D viewer can probe with HEAD or fetch partial content. Files resolve
//! strictly inside the job's own output directory; traversal attempts are
//! rejected before any disk access.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{self, HeaderMap};
use axum::http::StatusCode;
use axum::response::Response;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use img2mesh_core::job::JobStatus;
use img2mesh_core::paths::resolve_artifact;

use crate::error::{AppError, AppResult};
use crate::handlers::parse_job_id;
use crate::state::AppState;

/// Maximum read chunk size for open-ended range requests (1 MiB).
const MAX_CHUNK_SIZE: u64 = 1024 * 1024;

/// Guess a Content-Type from a file extension.
fn content_type_for_extension(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "obj" => "model/obj",
        "mtl" => "model/mtl",
        "glb" => "model/gltf-binary",
        "gltf" => "model/gltf+json",
        "stl" => "model/stl",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Parse a `Range: bytes=START-END` header value.
/// Returns `(start, optional_end)`.
fn parse_range_header(range: &str) -> Option<(u64, Option<u64>)> {
    let range = range.strip_prefix("bytes=")?;
    let parts: Vec<&str> = range.splitn(2, '-').collect();
    if parts.len() != 2 {
        return None;
    }
    let start = parts[0].parse::<u64>().ok()?;
    let end = if parts[1].is_empty() {
        None
    } else {
        Some(parts[1].parse::<u64>().ok()?)
    };
    Some((start, end))
}

/// GET /api/v1/output/{job_id}/{filename}
///
/// Serves an artifact of a finished job. Unknown jobs, unfinished jobs,
/// and missing files are all 404; a malformed file name is 400. axum
/// routes HEAD through here as well, dropping the body.
pub async fn serve_artifact(
    State(state): State<AppState>,
    Path((job_id, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let id = parse_job_id(&job_id)?;
    let job = state
        .registry
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {id}")))?;

    // Artifacts only exist for finished jobs; everything earlier is 404 so
    // clients cannot distinguish "not done" from "no such file".
    if job.status != JobStatus::Finished {
        return Err(AppError::NotFound(format!(
            "No artifact available for job {id}"
        )));
    }

    let resolved = resolve_artifact(&job.output_dir, &filename)?
        .ok_or_else(|| AppError::NotFound(format!("File not found: {filename}")))?;

    let metadata = tokio::fs::metadata(&resolved)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let file_size = metadata.len();
    let content_type = content_type_for_extension(&filename);

    // Check for Range header.
    if let Some(range_value) = headers.get(header::RANGE) {
        let range_str = range_value
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Range header".to_string()))?;

        if let Some((start, end)) = parse_range_header(range_str) {
            let end = end
                .map(|e| e.min(file_size.saturating_sub(1)))
                .unwrap_or_else(|| (start + MAX_CHUNK_SIZE - 1).min(file_size.saturating_sub(1)));

            if start >= file_size || start > end {
                return Ok(Response::builder()
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{file_size}"))
                    .body(Body::empty())
                    .unwrap());
            }

            let length = end - start + 1;

            let mut file = tokio::fs::File::open(&resolved)
                .await
                .map_err(|e| AppError::InternalError(e.to_string()))?;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|e| AppError::InternalError(e.to_string()))?;

            let limited = file.take(length);
            let stream = ReaderStream::new(limited);

            return Ok(Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, length.to_string())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {start}-{end}/{file_size}"),
                )
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::from_stream(stream))
                .unwrap());
        }
    }

    // No Range header -- serve the full file.
    let file = tokio::fs::File::open(&resolved)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let stream = ReaderStream::new(file);

    tracing::debug!(job_id = %id, file = %filename, "Serving artifact");

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, file_size.to_string())
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::from_stream(stream))
        .unwrap())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
