pub mod convert;
pub mod health;
pub mod output;
pub mod status;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /convert                      submit conversion (POST, multipart)
/// /convert/{job_id}/cancel      request cancellation (POST)
/// /status/{job_id}              poll job status (GET)
/// /output/{job_id}/{filename}   fetch artifact (GET/HEAD, range-capable)
/// ```
pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(convert::router(max_upload_bytes))
        .merge(status::router())
        .merge(output::router())
}
