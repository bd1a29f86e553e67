//! Background job queue abstraction.
//!
//! The queue only carries transient job state. The durable task record in
//! the database stays the source of truth; see [`crate::reconcile`] for how
//! the two are brought back in line.

mod memory;
mod redis_queue;

pub use memory::MemoryJobQueue;
pub use redis_queue::{build_queue, RedisConfig, RedisJobQueue};

use async_trait::async_trait;

use papyrus_core::{QueueJobStatus, QueueStats, QueuedJob, Result};

/// A FIFO queue of task jobs with per-job status tracking.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Append a job and mark it `queued`. Returns the job id.
    async fn enqueue(&self, job: &QueuedJob) -> Result<String>;

    /// Pop the oldest queued job, if any.
    async fn dequeue(&self) -> Result<Option<QueuedJob>>;

    /// Current status of a job, or `None` when the job is unknown or expired.
    async fn job_status(&self, job_id: &str) -> Result<Option<QueueJobStatus>>;

    /// Error recorded for a failed job.
    async fn job_error(&self, job_id: &str) -> Result<Option<String>>;

    /// Record a status transition, with an error message for failures.
    async fn set_job_status(
        &self,
        job_id: &str,
        status: QueueJobStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Cancel a job that has not started yet. Returns whether it was cancelled.
    async fn cancel(&self, job_id: &str) -> Result<bool>;

    /// Queue counters.
    async fn stats(&self) -> Result<QueueStats>;

    /// Whether the backend currently answers.
    async fn is_available(&self) -> bool;
}
