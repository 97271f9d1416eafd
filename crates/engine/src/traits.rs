use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;

/// Advisory progress callback, invoked with a 0–100 percentage.
///
/// Callers may drop reports; implementations must not rely on delivery.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// One image→3D conversion backend.
///
/// Contract: write the primary artifact somewhere under `output_dir` and
/// return its path. The caller owns timeout and cancellation — an
/// implementation must tolerate its future being dropped mid-flight and
/// release any held resources (child processes, file handles) when that
/// happens.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    async fn convert(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        progress: ProgressFn,
    ) -> Result<PathBuf, EngineError>;
}
