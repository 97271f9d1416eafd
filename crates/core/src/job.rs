//! Job data model and state machine.
//!
//! A [`Job`] is one submitted conversion request. Its lifecycle is strictly
//! monotonic:
//!
//! ```text
//! queued --> running --> finished   [terminal]
//!       \           \--> failed     [terminal]
//!        \--> failed (cancelled/rejected before a worker picked it up)
//! ```
//!
//! All mutation goes through the transition methods ([`Job::start`],
//! [`Job::finish`], [`Job::fail`], [`Job::set_progress`]) so an invalid
//! transition can never be stored in the registry.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
}

impl JobStatus {
    /// Ordering rank used to assert monotonic progression.
    ///
    /// `queued < running < {finished, failed}`. The two terminal states
    /// share a rank; neither can follow the other.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Finished | JobStatus::Failed => 2,
        }
    }

    /// Whether this state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether `from -> to` is a legal state transition.
    ///
    /// `Queued -> Failed` is legal so a job cancelled or rejected before any
    /// worker picked it up still reaches a terminal state.
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        matches!(
            (from, to),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Finished)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Queued, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// Internal job record held by the registry.
///
/// Never serialized to clients directly — the status endpoint builds a
/// projection that omits the filesystem paths.
#[derive(Debug, Clone)]
pub struct Job {
    /// Opaque external handle; also names the job's output directory.
    pub id: Uuid,
    pub status: JobStatus,
    /// Advisory completion percentage, 0–100, non-decreasing while running.
    pub progress: u8,
    /// Primary artifact produced by the engine; set only on `Finished`.
    pub artifact_path: Option<PathBuf>,
    /// Sanitized failure message; set only on `Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Staging directory holding the uploaded inputs. Deletion is owned by
    /// the worker's scoped guard; recorded here for observability.
    pub input_temp_dir: PathBuf,
    /// Per-job artifact directory, named by `id`, never shared.
    pub output_dir: PathBuf,
}

impl Job {
    /// Create a new record in `Queued` state.
    pub fn new(id: Uuid, input_temp_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            artifact_path: None,
            error: None,
            created_at: Utc::now(),
            input_temp_dir,
            output_dir,
        }
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), CoreError> {
        if !JobStatus::can_transition(self.status, to) {
            return Err(CoreError::Conflict(format!(
                "Invalid job transition {} -> {}",
                self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }

    /// `Queued -> Running`, progress reset to 0.
    pub fn start(&mut self) -> Result<(), CoreError> {
        self.transition(JobStatus::Running)?;
        self.progress = 0;
        Ok(())
    }

    /// `Running -> Finished`, recording the artifact and forcing progress
    /// to 100.
    pub fn finish(&mut self, artifact_path: PathBuf) -> Result<(), CoreError> {
        self.transition(JobStatus::Finished)?;
        self.artifact_path = Some(artifact_path);
        self.progress = 100;
        Ok(())
    }

    /// `{Queued, Running} -> Failed` with a human-readable message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// Record an advisory progress report.
    ///
    /// Progress never decreases and is clamped to 100. Reports arriving
    /// outside the `Running` state (a straggling engine callback after the
    /// job already reached a terminal state) are ignored rather than
    /// rejected.
    pub fn set_progress(&mut self, pct: u8) {
        if self.status == JobStatus::Running {
            self.progress = self.progress.max(pct.min(100));
        }
    }

    /// File name of the primary artifact, once finished.
    pub fn artifact_file_name(&self) -> Option<String> {
        self.artifact_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
