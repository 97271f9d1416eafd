//! Concurrency-safe job registry.
//!
//! The single source of truth for job state. One `RwLock` guards the map;
//! the map itself is never exposed. Readers get snapshots (clones), writers
//! go through [`JobRegistry::update`] which applies the mutation atomically
//! and only commits it if the mutator succeeds.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::CoreError;
use crate::job::Job;

/// Concurrency-safe store mapping job ids to job records.
///
/// Safe to share (`Arc<JobRegistry>`) between the submission handler, the
/// worker pool, and any number of concurrent status readers.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record.
    ///
    /// The id is caller-generated (UUIDv4), so a duplicate should never
    /// occur — but it is handled defensively rather than silently
    /// overwriting an existing job.
    pub async fn create(&self, job: Job) -> Result<(), CoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(CoreError::Conflict(format!(
                "Job id already registered: {}",
                job.id
            )));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    /// Snapshot of a job record. Never hands out a live reference.
    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Apply a state mutation atomically.
    ///
    /// The mutator runs against a scratch copy under the write lock; it is
    /// committed only if it returns `Ok`, so a rejected transition leaves
    /// the stored record untouched. Returns the updated snapshot.
    pub async fn update<F>(&self, id: Uuid, mutate: F) -> Result<Job, CoreError>
    where
        F: FnOnce(&mut Job) -> Result<(), CoreError>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "Job", id })?;

        let mut updated = job.clone();
        mutate(&mut updated)?;
        *job = updated.clone();
        Ok(updated)
    }

    /// Remove a record.
    ///
    /// Only used to roll back a registration when the submission queue
    /// rejects the job; completed jobs are retained (no eviction policy is
    /// defined for them).
    pub async fn remove(&self, id: Uuid) -> Option<Job> {
        self.jobs.write().await.remove(&id)
    }

    /// Number of registered jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
