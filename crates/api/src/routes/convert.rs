//! Route definitions for the `/convert` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::convert;
use crate::state::AppState;

/// Routes mounted at `/convert`.
///
/// ```text
/// POST   /convert                   -> submit_conversion
/// POST   /convert/{job_id}/cancel   -> cancel_conversion
/// ```
///
/// The multipart body limit replaces axum's 2 MiB default, which is far
/// too small for image uploads.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/convert", post(convert::submit_conversion))
        .route("/convert/{job_id}/cancel", post(convert::cancel_conversion))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
