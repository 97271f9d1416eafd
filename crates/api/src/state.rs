use std::sync::Arc;

use img2mesh_core::registry::JobRegistry;
use img2mesh_worker::PoolHandle;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already
/// `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Concurrency-safe job store; the single source of truth for job state.
    pub registry: Arc<JobRegistry>,
    /// Submission/cancellation handle for the conversion worker pool.
    pub pool: PoolHandle,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
