//! Subprocess-backed conversion engine.
//!
//! Invokes a configured local pipeline (in production, the Python wrapper
//! around the Hunyuan3D shape-generation model) as a child process. The
//! child receives the input file paths followed by `--output-dir <dir>`,
//! reports progress as `progress <n>` lines on stdout, and is expected to
//! leave a mesh file under the output directory on success.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::error::EngineError;
use crate::traits::{ConversionEngine, ProgressFn};

/// Maximum stderr captured from the child (64 KiB).
///
/// Output beyond this is discarded to prevent memory exhaustion from a
/// runaway pipeline.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Artifact extensions recognized as the primary model output, in
/// preference order.
const MODEL_EXTENSIONS: &[&str] = &["glb", "obj", "gltf", "stl", "ply"];

/// Conversion engine that shells out to a configured command.
pub struct CommandEngine {
    program: PathBuf,
    base_args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }
}

#[async_trait]
impl ConversionEngine for CommandEngine {
    async fn convert(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        progress: ProgressFn,
    ) -> Result<PathBuf, EngineError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(inputs)
            .arg("--output-dir")
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The caller enforces timeout/cancellation by dropping this
            // future; kill_on_drop ensures the child dies with it.
            .kill_on_drop(true);

        tracing::debug!(
            program = %self.program.display(),
            input_count = inputs.len(),
            "Spawning conversion pipeline",
        );

        let mut child = cmd.spawn()?;

        // Read stdout and stderr in spawned tasks so `child.wait()` can run
        // concurrently without deadlocking on full pipes.
        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();

        let progress_task = tokio::spawn(drive_progress(stdout_handle, progress));
        let stderr_task = tokio::spawn(read_capped(stderr_handle));

        let status = child.wait().await?;
        let _ = progress_task.await;
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let diagnostic = last_stderr_line(&stderr_bytes).unwrap_or_else(|| {
                format!("pipeline exited with status {}", status.code().unwrap_or(-1))
            });
            return Err(EngineError::Failed(diagnostic));
        }

        locate_artifact(output_dir).await
    }
}

/// Consume stdout lines, forwarding `progress <n>` reports.
async fn drive_progress<R: AsyncRead + Unpin>(handle: Option<R>, progress: ProgressFn) {
    let Some(handle) = handle else { return };
    let mut lines = BufReader::new(handle).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(pct) = parse_progress_line(&line) {
            progress(pct);
        }
    }
}

/// Parse a `progress <n>` line (case-insensitive), clamping to 100.
fn parse_progress_line(line: &str) -> Option<u8> {
    let rest = line.trim().strip_prefix("progress")
        .or_else(|| line.trim().strip_prefix("PROGRESS"))?;
    let value: u32 = rest.trim().parse().ok()?;
    Some(value.min(100) as u8)
}

/// Read an entire stream into a byte buffer, capped at [`MAX_STDERR_BYTES`].
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_STDERR_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

/// Last non-empty stderr line, used as the failure diagnostic.
fn last_stderr_line(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// Locate the primary artifact under `output_dir`.
///
/// Picks the first non-empty file whose extension appears in
/// [`MODEL_EXTENSIONS`], honoring the preference order.
async fn locate_artifact(output_dir: &Path) -> Result<PathBuf, EngineError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    let mut entries = tokio::fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_model = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| MODEL_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_model {
            candidates.push(path);
        }
    }

    candidates.sort_by_key(|path| {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        MODEL_EXTENSIONS
            .iter()
            .position(|known| *known == ext)
            .unwrap_or(usize::MAX)
    });

    for path in candidates {
        let metadata = tokio::fs::metadata(&path).await?;
        if metadata.len() > 0 {
            return Ok(path);
        }
    }

    Err(EngineError::MissingArtifact)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
