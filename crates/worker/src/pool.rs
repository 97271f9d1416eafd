//! Worker pool construction, submission queue, and cancellation registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use img2mesh_core::registry::JobRegistry;
use img2mesh_engine::ConversionEngine;

use crate::runner;

/// How long `shutdown` waits for each worker to drain its current job.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Pool sizing and per-job limits.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent workers. Defaults to 1: the conversion engine
    /// typically holds an exclusive GPU and is not reentrant-safe.
    pub workers: usize,
    /// Capacity of the submission queue. A full queue rejects submissions.
    pub queue_depth: usize,
    /// Hard deadline for a single conversion.
    pub job_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_depth: 16,
            job_timeout: Duration::from_secs(600),
        }
    }
}

// ---------------------------------------------------------------------------
// Queued job
// ---------------------------------------------------------------------------

/// One unit of work handed to the pool.
///
/// Owns the staging directory guard: whichever path the job takes
/// (converted, failed, cancelled, rejected), dropping the guard removes the
/// uploaded inputs from disk.
#[derive(Debug)]
pub struct QueuedJob {
    pub id: Uuid,
    /// Saved upload paths, all inside the staging directory.
    pub inputs: Vec<PathBuf>,
    /// Per-job artifact directory.
    pub output_dir: PathBuf,
    /// RAII guard over the staging directory.
    pub input_guard: TempDir,
    /// Cancellation signal observed before and during the engine call.
    pub cancel_token: CancellationToken,
}

impl QueuedJob {
    pub fn new(id: Uuid, inputs: Vec<PathBuf>, output_dir: PathBuf, input_guard: TempDir) -> Self {
        Self {
            id,
            inputs,
            output_dir,
            input_guard,
            cancel_token: CancellationToken::new(),
        }
    }
}

/// Submission failure, carrying the job back so the caller can roll back
/// (the registry entry it created, the staging directory via the guard).
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Submission queue is full")]
    QueueFull(QueuedJob),

    #[error("Worker pool is shut down")]
    Closed(QueuedJob),
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

type CancelMap = Arc<Mutex<HashMap<Uuid, CancellationToken>>>;

/// Fixed-size pool of conversion workers.
pub struct WorkerPool;

impl WorkerPool {
    /// Spawn the worker tasks and return the submission handle.
    pub fn start(
        registry: Arc<JobRegistry>,
        engine: Arc<dyn ConversionEngine>,
        config: PoolConfig,
    ) -> PoolHandle {
        let (tx, rx) = mpsc::channel::<QueuedJob>(config.queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let cancellations: CancelMap = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        let worker_count = config.workers.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&rx),
                Arc::clone(&registry),
                Arc::clone(&engine),
                Arc::clone(&cancellations),
                config.job_timeout,
                shutdown.clone(),
            )));
        }

        tracing::info!(
            workers = worker_count,
            queue_depth = config.queue_depth,
            job_timeout_secs = config.job_timeout.as_secs(),
            "Worker pool started",
        );

        PoolHandle {
            tx,
            cancellations,
            shutdown,
            workers: Arc::new(Mutex::new(workers)),
        }
    }
}

/// Cloneable handle for submitting and cancelling jobs.
#[derive(Clone)]
pub struct PoolHandle {
    tx: mpsc::Sender<QueuedJob>,
    cancellations: CancelMap,
    shutdown: CancellationToken,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PoolHandle {
    /// Enqueue a job, registering its cancellation token.
    ///
    /// Rejects with [`SubmitError::QueueFull`] when the queue is at
    /// capacity; the caller maps this to HTTP 429.
    pub async fn submit(&self, job: QueuedJob) -> Result<(), SubmitError> {
        let id = job.id;
        self.cancellations
            .lock()
            .await
            .insert(id, job.cancel_token.clone());

        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.cancellations.lock().await.remove(&id);
                Err(SubmitError::QueueFull(job))
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.cancellations.lock().await.remove(&id);
                Err(SubmitError::Closed(job))
            }
        }
    }

    /// Signal a job's cancellation token.
    ///
    /// Returns `false` when the job is unknown or already past the point of
    /// cancellation (token removed after reaching a terminal state).
    pub async fn cancel(&self, id: Uuid) -> bool {
        match self.cancellations.lock().await.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop accepting work and wait (bounded) for workers to drain.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                tracing::warn!("Worker did not stop within the shutdown grace period");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

// ---------------------------------------------------------------------------
// Worker loop
// ---------------------------------------------------------------------------

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    registry: Arc<JobRegistry>,
    engine: Arc<dyn ConversionEngine>,
    cancellations: CancelMap,
    job_timeout: Duration,
    shutdown: CancellationToken,
) {
    tracing::debug!(worker_id, "Worker started");
    loop {
        // Hold the receiver lock only while waiting for the next job so
        // idle workers take turns on the shared queue.
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => None,
                job = rx.recv() => job,
            }
        };

        let Some(job) = next else { break };
        let id = job.id;

        runner::process_job(&registry, &engine, job, job_timeout).await;
        cancellations.lock().await.remove(&id);
    }
    tracing::debug!(worker_id, "Worker stopped");
}
