//! Route definitions for the `/status` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::status;
use crate::state::AppState;

/// Routes mounted at `/status`.
///
/// ```text
/// GET    /status/{job_id}   -> get_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/status/{job_id}", get(status::get_status))
}
