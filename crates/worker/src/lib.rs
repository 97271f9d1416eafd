//! Bounded worker pool executing conversion jobs out-of-band.
//!
//! A fixed number of long-lived worker tasks consume from a bounded
//! submission queue. A full queue is surfaced to the submitter as
//! backpressure instead of spawning unbounded per-request workers, so the
//! pool can be sized to match an exclusive resource (one GPU, one worker).

mod pool;
mod runner;

pub use pool::{PoolConfig, PoolHandle, QueuedJob, SubmitError, WorkerPool};
