//! Route definitions for the `/output` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::output;
use crate::state::AppState;

/// Routes mounted at `/output`.
///
/// ```text
/// GET    /output/{job_id}/{filename}   -> serve_artifact (HEAD included)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/output/{job_id}/{filename}", get(output::serve_artifact))
}
