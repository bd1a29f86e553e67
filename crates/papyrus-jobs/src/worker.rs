//! Queue worker that executes background tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use papyrus_core::defaults::{
    EVENT_BUS_CAPACITY, JOB_MAX_CONCURRENT, JOB_POLL_INTERVAL_MS, JOB_TIMEOUT_SECS,
};
use papyrus_core::{Error, QueueJobStatus, QueuedJob, Result, TaskType};

use crate::executor::{error_message, TaskExecutor, TASK_CANCELLED_MESSAGE};
use crate::queue::JobQueue;

/// Configuration for the queue worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent tasks.
    pub max_concurrent_jobs: usize,
    /// Per-task execution timeout in seconds.
    pub job_timeout_secs: u64,
    /// Whether to process tasks at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: JOB_POLL_INTERVAL_MS,
            max_concurrent_jobs: JOB_MAX_CONCURRENT,
            job_timeout_secs: JOB_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable task processing |
    /// | `JOB_MAX_CONCURRENT` | `4` | Max concurrent tasks |
    /// | `JOB_POLL_INTERVAL_MS` | `500` | Polling interval when the queue is empty |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(JOB_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(JOB_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            job_timeout_secs: JOB_TIMEOUT_SECS,
            enabled,
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    pub fn with_job_timeout(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Failure message recorded for a task that ran past the timeout.
    pub fn timeout_message(&self) -> String {
        format!("Task exceeded timeout of {}s", self.job_timeout_secs)
    }
}

/// Event emitted by the worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Worker started polling.
    WorkerStarted,
    /// A task was picked up from the queue.
    TaskStarted {
        task_id: Uuid,
        task_type: TaskType,
        job_id: String,
    },
    /// A task completed successfully.
    TaskCompleted { task_id: Uuid, task_type: TaskType },
    /// A task failed, timed out or was cancelled while running.
    TaskFailed {
        task_id: Uuid,
        task_type: TaskType,
        error: String,
    },
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    /// Signal shutdown and wait until jobs already claimed have finished.
    pub async fn shutdown_and_wait(self) -> Result<()> {
        // A worker that already exited has dropped its receiver.
        let _ = self.shutdown_tx.send(()).await;
        self.join
            .await
            .map_err(|e| Error::Internal(format!("Queue worker task failed: {}", e)))
    }
}

/// Worker that pulls jobs off the queue and runs them through the executor.
#[derive(Clone)]
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    executor: Arc<TaskExecutor>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    pub fn new(queue: Arc<dyn JobQueue>, executor: Arc<TaskExecutor>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            queue,
            executor,
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let join = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            join,
        }
    }

    /// Run the worker loop.
    ///
    /// Claims up to `max_concurrent_jobs` at a time and processes them
    /// concurrently. Only sleeps when the queue is empty.
    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Queue worker is disabled, not starting");
            return;
        }

        info!(
            queue = self.queue.name(),
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            "Queue worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Queue worker received shutdown signal");
                break;
            }

            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..self.config.max_concurrent_jobs {
                match self.claim_job().await {
                    Some(job) => {
                        claimed += 1;
                        let worker = self.clone();
                        tasks.spawn(async move {
                            worker.process(job).await;
                        });
                    }
                    None => break,
                }
            }

            if claimed == 0 {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Queue worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing concurrent task batch");
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Task execution panicked");
                    }
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Queue worker stopped");
    }

    async fn claim_job(&self) -> Option<QueuedJob> {
        match self.queue.dequeue().await {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "Failed to dequeue job");
                None
            }
        }
    }

    /// Run one job and record its outcome on the queue.
    async fn process(self, job: QueuedJob) {
        let start = Instant::now();
        let QueuedJob {
            job_id,
            task_id,
            task_type,
            ..
        } = job;

        info!(
            subsystem = "jobs",
            component = "worker",
            task_id = %task_id,
            %task_type,
            job_id = %job_id,
            "Processing task"
        );
        self.set_status(&job_id, QueueJobStatus::Started, None).await;
        let _ = self.event_tx.send(WorkerEvent::TaskStarted {
            task_id,
            task_type,
            job_id: job_id.clone(),
        });

        let timeout = Duration::from_secs(self.config.job_timeout_secs);
        let outcome = match tokio::time::timeout(timeout, self.executor.execute(task_id)).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => {
                let message = self.config.timeout_message();
                warn!(
                    subsystem = "jobs",
                    task_id = %task_id,
                    %task_type,
                    "{}",
                    message
                );
                if let Err(e) = self.executor.mark_failed(task_id, &message).await {
                    error!(error = %e, task_id = %task_id, "Failed to mark timed out task");
                }
                Err(Error::Job(message))
            }
        };

        match outcome {
            Ok(()) => {
                self.set_status(&job_id, QueueJobStatus::Finished, None).await;
                info!(
                    subsystem = "jobs",
                    component = "worker",
                    task_id = %task_id,
                    %task_type,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Task completed"
                );
                let _ = self
                    .event_tx
                    .send(WorkerEvent::TaskCompleted { task_id, task_type });
            }
            Err(e) => {
                let error = error_message(&e);
                let status = if error == TASK_CANCELLED_MESSAGE {
                    QueueJobStatus::Canceled
                } else {
                    QueueJobStatus::Failed
                };
                self.set_status(&job_id, status, Some(&error)).await;
                warn!(
                    subsystem = "jobs",
                    component = "worker",
                    task_id = %task_id,
                    %task_type,
                    %error,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Task failed"
                );
                let _ = self.event_tx.send(WorkerEvent::TaskFailed {
                    task_id,
                    task_type,
                    error,
                });
            }
        }
    }

    async fn set_status(&self, job_id: &str, status: QueueJobStatus, error: Option<&str>) {
        if let Err(e) = self.queue.set_job_status(job_id, status, error).await {
            warn!(
                subsystem = "jobs",
                component = "worker",
                job_id,
                %status,
                error = %e,
                "Failed to update queue job status"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::extraction::ExtractionRegistry;
    use crate::handler::{JobContext, TaskHandler};
    use crate::queue::{MemoryJobQueue, RedisConfig};
    use crate::submission::TaskSubmitter;
    use async_trait::async_trait;
    use papyrus_core::{
        NewDocumentFile, NewTask, SubmissionMode, Task, TaskRepository, TaskStatus,
    };
    use papyrus_db::MemoryDatabase;
    use papyrus_inference::mock::{MockGenerationBackend, MockProvider};
    use serde_json::{json, Value as JsonValue};

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.job_timeout_secs, 600);
        assert!(config.enabled);
        assert_eq!(config.timeout_message(), "Task exceeded timeout of 600s");
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::default()
            .with_poll_interval(1000)
            .with_max_concurrent(0)
            .with_job_timeout(30)
            .with_enabled(false);

        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.job_timeout_secs, 30);
        assert!(!config.enabled);
    }

    async fn next_task_event(events: &mut broadcast::Receiver<WorkerEvent>) -> WorkerEvent {
        loop {
            match events.recv().await.unwrap() {
                WorkerEvent::WorkerStarted | WorkerEvent::TaskStarted { .. } => continue,
                other => return other,
            }
        }
    }

    #[tokio::test]
    async fn test_worker_runs_queued_extraction() {
        let db = MemoryDatabase::new();
        let user_id = Uuid::new_v4();
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"Abstract\nQueued paper.").unwrap();
        let doc = db
            .repositories()
            .documents
            .insert(NewDocumentFile {
                user_id,
                filename: "queued.txt".to_string(),
                mime_type: None,
                size_bytes: 22,
                storage_path: file.path().to_string_lossy().to_string(),
            })
            .await
            .unwrap();

        let queue = Arc::new(MemoryJobQueue::new());
        let executor = Arc::new(TaskExecutor::with_default_handlers(
            db.repositories(),
            Arc::new(MockProvider::new(MockGenerationBackend::new())),
            Arc::new(ExtractionRegistry::with_defaults()),
        ));
        let submitter = TaskSubmitter::new(
            db.repositories(),
            executor.clone(),
            Some(queue.clone()),
            RedisConfig::default(),
        );
        let submitted = submitter
            .submit(user_id, doc.id, TaskType::Extract, None)
            .await
            .unwrap();
        assert_eq!(submitted.mode, SubmissionMode::Queued);
        let job_id = submitted.task.queue_job_id().unwrap().to_string();

        let worker = JobWorker::new(
            queue.clone(),
            executor,
            WorkerConfig::default().with_poll_interval(10),
        );
        let mut events = worker.events();
        let handle = worker.start();

        let event = next_task_event(&mut events).await;
        assert!(matches!(
            event,
            WorkerEvent::TaskCompleted { task_id, .. } if task_id == submitted.task.task_id
        ));
        handle.shutdown().await.unwrap();

        let task = db
            .tasks
            .get_unscoped(submitted.task.task_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(
            queue.job_status(&job_id).await.unwrap(),
            Some(QueueJobStatus::Finished)
        );
    }

    struct SlowHandler;

    #[async_trait]
    impl TaskHandler for SlowHandler {
        fn task_type(&self) -> TaskType {
            TaskType::Mindmap
        }

        fn requires_llm(&self, _task: &Task) -> bool {
            false
        }

        async fn execute(&self, _ctx: JobContext) -> Result<JsonValue> {
            sleep(Duration::from_secs(30)).await;
            Ok(json!({}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_marks_timed_out_task_failed() {
        let db = MemoryDatabase::new();
        let task = db
            .tasks
            .create(NewTask {
                user_id: Uuid::new_v4(),
                file_id: None,
                task_type: TaskType::Mindmap,
                options: None,
            })
            .await
            .unwrap();

        let queue = Arc::new(MemoryJobQueue::new());
        let job = QueuedJob::for_task(&task);
        queue.enqueue(&job).await.unwrap();

        let mut executor = TaskExecutor::new(
            db.repositories(),
            Arc::new(MockProvider::new(MockGenerationBackend::new())),
        );
        executor.register(Arc::new(SlowHandler));

        let config = WorkerConfig::default()
            .with_poll_interval(10)
            .with_job_timeout(1);
        let worker = JobWorker::new(queue.clone(), Arc::new(executor), config);
        let mut events = worker.events();
        let handle = worker.start();

        let event = next_task_event(&mut events).await;
        let WorkerEvent::TaskFailed { error, .. } = event else {
            panic!("expected task failure");
        };
        assert_eq!(error, "Task exceeded timeout of 1s");
        handle.shutdown().await.unwrap();

        let stored = db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("Task exceeded timeout of 1s")
        );
        assert_eq!(
            queue.job_error(&job.job_id).await.unwrap().as_deref(),
            Some("Task exceeded timeout of 1s")
        );
    }

    struct BriefHandler;

    #[async_trait]
    impl TaskHandler for BriefHandler {
        fn task_type(&self) -> TaskType {
            TaskType::Mindmap
        }

        fn requires_llm(&self, _task: &Task) -> bool {
            false
        }

        async fn execute(&self, _ctx: JobContext) -> Result<JsonValue> {
            sleep(Duration::from_secs(2)).await;
            Ok(json!({"mindmap": {"name": "root"}}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_claimed_job() {
        let db = MemoryDatabase::new();
        let task = db
            .tasks
            .create(NewTask {
                user_id: Uuid::new_v4(),
                file_id: None,
                task_type: TaskType::Mindmap,
                options: None,
            })
            .await
            .unwrap();

        let queue = Arc::new(MemoryJobQueue::new());
        queue.enqueue(&QueuedJob::for_task(&task)).await.unwrap();

        let mut executor = TaskExecutor::new(
            db.repositories(),
            Arc::new(MockProvider::new(MockGenerationBackend::new())),
        );
        executor.register(Arc::new(BriefHandler));

        let worker = JobWorker::new(
            queue.clone(),
            Arc::new(executor),
            WorkerConfig::default().with_poll_interval(10),
        );
        let mut events = worker.events();
        let handle = worker.start();
        loop {
            if let WorkerEvent::TaskStarted { .. } = events.recv().await.unwrap() {
                break;
            }
        }

        handle.shutdown_and_wait().await.unwrap();

        let stored = db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_disabled_worker_does_not_start() {
        let db = MemoryDatabase::new();
        let queue = Arc::new(MemoryJobQueue::new());
        let executor = Arc::new(TaskExecutor::new(
            db.repositories(),
            Arc::new(MockProvider::new(MockGenerationBackend::new())),
        ));
        let worker = JobWorker::new(
            queue,
            executor,
            WorkerConfig::default().with_enabled(false),
        );
        let mut events = worker.events();
        let _handle = worker.start();

        let received = tokio::time::timeout(Duration::from_millis(100), events.recv()).await;
        assert!(!matches!(received, Ok(Ok(WorkerEvent::WorkerStarted))));
    }
}
