//! Execution of a single conversion job.
//!
//! Every failure mode of the engine call (error, missing artifact, timeout,
//! cancellation, panic) is converted into a job state update; nothing
//! escapes to crash the worker. The staging directory is removed on every
//! exit path via the job's RAII guard.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use img2mesh_core::paths::sanitize_message;
use img2mesh_core::registry::JobRegistry;
use img2mesh_engine::{ConversionEngine, ProgressFn};

use crate::pool::QueuedJob;

/// Run one job to a terminal state and clean up its inputs.
pub(crate) async fn process_job(
    registry: &Arc<JobRegistry>,
    engine: &Arc<dyn ConversionEngine>,
    job: QueuedJob,
    job_timeout: Duration,
) {
    let QueuedJob {
        id,
        inputs,
        output_dir,
        input_guard,
        cancel_token,
    } = job;

    let outcome = run_conversion(
        registry,
        engine,
        id,
        inputs,
        output_dir,
        &cancel_token,
        job_timeout,
    )
    .await;

    let recorded = match outcome {
        Ok(artifact) => {
            tracing::info!(job_id = %id, artifact = %artifact.display(), "Conversion finished");
            registry.update(id, |job| job.finish(artifact)).await
        }
        Err(reason) => {
            tracing::warn!(job_id = %id, error = %reason, "Conversion failed");
            registry.update(id, |job| job.fail(reason)).await
        }
    };
    if let Err(e) = recorded {
        tracing::error!(job_id = %id, error = %e, "Failed to record job outcome");
    }

    // Unconditional input cleanup. Explicit close surfaces the I/O error;
    // the guard would remove the directory on drop regardless.
    if let Err(e) = input_guard.close() {
        tracing::warn!(job_id = %id, error = %e, "Failed to remove staging directory");
    }
}

/// Drive the engine call, racing it against cancellation and the deadline.
///
/// Returns the verified artifact path or a client-safe failure reason.
async fn run_conversion(
    registry: &Arc<JobRegistry>,
    engine: &Arc<dyn ConversionEngine>,
    id: Uuid,
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    cancel_token: &CancellationToken,
    job_timeout: Duration,
) -> Result<PathBuf, String> {
    if cancel_token.is_cancelled() {
        return Err("Conversion cancelled before it started".to_string());
    }

    registry
        .update(id, |job| job.start())
        .await
        .map_err(|e| format!("Could not start job: {e}"))?;

    let progress = progress_reporter(Arc::clone(registry), id);

    // The engine runs in its own task: a panic inside it surfaces as a
    // JoinError here instead of unwinding through the worker loop.
    let engine = Arc::clone(engine);
    let mut conversion =
        tokio::spawn(async move { engine.convert(&inputs, &output_dir, progress).await });

    let joined = tokio::select! {
        _ = cancel_token.cancelled() => {
            conversion.abort();
            return Err("Conversion cancelled by client".to_string());
        }
        joined = tokio::time::timeout(job_timeout, &mut conversion) => joined,
    };

    match joined {
        Err(_elapsed) => {
            conversion.abort();
            Err(format!(
                "Conversion timed out after {}s",
                job_timeout.as_secs()
            ))
        }
        Ok(Err(join_err)) if join_err.is_panic() => {
            Err("Conversion pipeline panicked".to_string())
        }
        Ok(Err(_)) => Err("Conversion aborted".to_string()),
        Ok(Ok(Err(engine_err))) => Err(sanitize_message(&engine_err.to_string())),
        Ok(Ok(Ok(artifact))) => verify_artifact(artifact).await,
    }
}

/// The engine's claimed artifact must exist and be non-empty.
async fn verify_artifact(path: PathBuf) -> Result<PathBuf, String> {
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.len() > 0 => Ok(path),
        Ok(_) => Err("Conversion produced an empty artifact".to_string()),
        Err(_) => Err("Conversion produced no usable artifact".to_string()),
    }
}

/// Progress callback bridging the engine's sync reports into registry
/// updates. Reports may land out of order; `set_progress` is monotonic so
/// reordering is harmless.
fn progress_reporter(registry: Arc<JobRegistry>, id: Uuid) -> ProgressFn {
    Arc::new(move |pct| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let _ = registry
                .update(id, |job| {
                    job.set_progress(pct);
                    Ok(())
                })
                .await;
        });
    })
}
