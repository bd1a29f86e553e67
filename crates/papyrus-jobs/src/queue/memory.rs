//! In-process job queue used by tests and local development.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use papyrus_core::{Error, QueueJobStatus, QueueStats, QueuedJob, Result};

use super::JobQueue;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<String>,
    jobs: HashMap<String, JobEntry>,
}

struct JobEntry {
    job: QueuedJob,
    status: QueueJobStatus,
    error: Option<String>,
}

/// Job queue held entirely in memory.
///
/// Enqueue failures and outages can be switched on to exercise the
/// synchronous fallback paths.
#[derive(Default)]
pub struct MemoryJobQueue {
    state: Mutex<QueueState>,
    fail_enqueue: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent enqueue fail.
    pub fn set_fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Report the queue as unreachable.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of jobs waiting to be dequeued.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    fn name(&self) -> &str {
        "memory"
    }

    async fn enqueue(&self, job: &QueuedJob) -> Result<String> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(Error::Queue("enqueue rejected".to_string()));
        }
        let mut state = self.lock();
        state.pending.push_back(job.job_id.clone());
        state.jobs.insert(
            job.job_id.clone(),
            JobEntry {
                job: job.clone(),
                status: QueueJobStatus::Queued,
                error: None,
            },
        );
        Ok(job.job_id.clone())
    }

    async fn dequeue(&self) -> Result<Option<QueuedJob>> {
        let mut state = self.lock();
        while let Some(job_id) = state.pending.pop_front() {
            if let Some(entry) = state.jobs.get(&job_id) {
                if entry.status == QueueJobStatus::Queued {
                    return Ok(Some(entry.job.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn job_status(&self, job_id: &str) -> Result<Option<QueueJobStatus>> {
        Ok(self.lock().jobs.get(job_id).map(|e| e.status))
    }

    async fn job_error(&self, job_id: &str) -> Result<Option<String>> {
        Ok(self.lock().jobs.get(job_id).and_then(|e| e.error.clone()))
    }

    async fn set_job_status(
        &self,
        job_id: &str,
        status: QueueJobStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut state = self.lock();
        let entry = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::Queue(format!("Unknown job: {}", job_id)))?;
        entry.status = status;
        if let Some(error) = error {
            entry.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> Result<bool> {
        let mut state = self.lock();
        let Some(position) = state.pending.iter().position(|id| id == job_id) else {
            return Ok(false);
        };
        state.pending.remove(position);
        if let Some(entry) = state.jobs.get_mut(job_id) {
            entry.status = QueueJobStatus::Canceled;
        }
        Ok(true)
    }

    async fn stats(&self) -> Result<QueueStats> {
        let state = self.lock();
        let count = |status: QueueJobStatus| {
            state.jobs.values().filter(|e| e.status == status).count() as i64
        };
        Ok(QueueStats {
            size: state.pending.len() as i64,
            started: count(QueueJobStatus::Started),
            finished: count(QueueJobStatus::Finished),
            failed: count(QueueJobStatus::Failed),
            canceled: count(QueueJobStatus::Canceled),
        })
    }

    async fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use papyrus_core::TaskType;
    use uuid::Uuid;

    fn job() -> QueuedJob {
        QueuedJob {
            job_id: Uuid::new_v4().to_string(),
            task_id: Uuid::now_v7(),
            task_type: TaskType::Extract,
            enqueued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_dequeue_fifo() {
        let queue = MemoryJobQueue::new();
        let first = job();
        let second = job();
        queue.enqueue(&first).await.unwrap();
        queue.enqueue(&second).await.unwrap();

        assert_eq!(queue.dequeue().await.unwrap(), Some(first.clone()));
        assert_eq!(queue.dequeue().await.unwrap(), Some(second));
        assert_eq!(queue.dequeue().await.unwrap(), None);
        assert_eq!(
            queue.job_status(&first.job_id).await.unwrap(),
            Some(QueueJobStatus::Queued)
        );
    }

    #[tokio::test]
    async fn test_fail_enqueue_switch() {
        let queue = MemoryJobQueue::new();
        queue.set_fail_enqueue(true);
        assert!(matches!(queue.enqueue(&job()).await, Err(Error::Queue(_))));
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_cancel_only_pending_jobs() {
        let queue = MemoryJobQueue::new();
        let queued = job();
        let running = job();
        queue.enqueue(&queued).await.unwrap();
        queue.enqueue(&running).await.unwrap();

        assert!(queue.cancel(&queued.job_id).await.unwrap());
        assert_eq!(
            queue.job_status(&queued.job_id).await.unwrap(),
            Some(QueueJobStatus::Canceled)
        );

        let claimed = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(claimed.job_id, running.job_id);
        queue
            .set_job_status(&running.job_id, QueueJobStatus::Started, None)
            .await
            .unwrap();
        assert!(!queue.cancel(&running.job_id).await.unwrap());
        assert!(!queue.cancel("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_and_errors() {
        let queue = MemoryJobQueue::new();
        let ok = job();
        let bad = job();
        queue.enqueue(&ok).await.unwrap();
        queue.enqueue(&bad).await.unwrap();
        queue.enqueue(&job()).await.unwrap();
        queue.dequeue().await.unwrap();
        queue.dequeue().await.unwrap();

        queue
            .set_job_status(&ok.job_id, QueueJobStatus::Finished, None)
            .await
            .unwrap();
        queue
            .set_job_status(&bad.job_id, QueueJobStatus::Failed, Some("boom"))
            .await
            .unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!(
            stats,
            QueueStats {
                size: 1,
                started: 0,
                finished: 1,
                failed: 1,
                canceled: 0,
            }
        );
        assert_eq!(
            queue.job_error(&bad.job_id).await.unwrap().as_deref(),
            Some("boom")
        );
        assert!(queue
            .set_job_status("missing", QueueJobStatus::Started, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_availability_switch() {
        let queue = MemoryJobQueue::new();
        assert!(queue.is_available().await);
        queue.set_available(false);
        assert!(!queue.is_available().await);
    }
}
