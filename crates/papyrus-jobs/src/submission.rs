//! Task submission: create the record, then queue it or run it in-process.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use papyrus_core::defaults::SYNC_EXECUTION_JOB_ID;
use papyrus_core::{
    CancelOutcome, Error, NewTask, QueueMode, QueueStats, QueuedJob, RedisStatus, Repositories,
    Result, SubmissionMode, Task, TaskStatusUpdate, TaskType,
};

use crate::executor::TaskExecutor;
use crate::queue::{JobQueue, RedisConfig};

/// Why a submission did not produce a usable task.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The task could not be created (unknown file, database failure).
    #[error(transparent)]
    Rejected(#[from] Error),

    /// The task was created and run in-process, but execution failed.
    /// The record is already marked `failed`.
    #[error("Task {task_id} failed: {source}")]
    ExecutionFailed {
        task_id: Uuid,
        #[source]
        source: Error,
    },
}

/// A created task and how it is being executed.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedTask {
    pub task: Task,
    pub mode: SubmissionMode,
}

/// Creates tasks and hands them to the queue, falling back to synchronous execution.
pub struct TaskSubmitter {
    repos: Repositories,
    executor: Arc<TaskExecutor>,
    queue: Option<Arc<dyn JobQueue>>,
    redis_config: RedisConfig,
}

impl TaskSubmitter {
    pub fn new(
        repos: Repositories,
        executor: Arc<TaskExecutor>,
        queue: Option<Arc<dyn JobQueue>>,
        redis_config: RedisConfig,
    ) -> Self {
        Self {
            repos,
            executor,
            queue,
            redis_config,
        }
    }

    pub fn executor(&self) -> &Arc<TaskExecutor> {
        &self.executor
    }

    pub fn queue(&self) -> Option<&Arc<dyn JobQueue>> {
        self.queue.as_ref()
    }

    /// Create a task for a user's file and start it.
    pub async fn submit(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        task_type: TaskType,
        options: Option<JsonValue>,
    ) -> std::result::Result<SubmittedTask, SubmitError> {
        self.repos
            .documents
            .get(file_id, user_id)
            .await?
            .ok_or(Error::FileNotFound(file_id))?;

        let task = self
            .repos
            .tasks
            .create(NewTask {
                user_id,
                file_id: Some(file_id),
                task_type,
                options,
            })
            .await?;
        let task_id = task.task_id;
        debug!(
            subsystem = "jobs",
            component = "submitter",
            op = "submit",
            task_id = %task_id,
            %task_type,
            file_id = %file_id,
            user_id = %user_id,
            "Task created"
        );

        if let Some(job_id) = self.try_enqueue(&task).await {
            let task = self
                .repos
                .tasks
                .update_status(task_id, TaskStatusUpdate::job_id(job_id))
                .await?
                .ok_or(Error::TaskNotFound(task_id))?;
            return Ok(SubmittedTask {
                task,
                mode: SubmissionMode::Queued,
            });
        }

        self.run_synchronously(task_id).await
    }

    /// Enqueue the task if a queue is attached and reachable.
    async fn try_enqueue(&self, task: &Task) -> Option<String> {
        let queue = self.queue.as_ref()?;
        if !queue.is_available().await {
            warn!(
                subsystem = "jobs",
                component = "submitter",
                task_id = %task.task_id,
                queue = queue.name(),
                "Queue unavailable, executing synchronously"
            );
            return None;
        }

        match queue.enqueue(&QueuedJob::for_task(task)).await {
            Ok(job_id) => {
                info!(
                    subsystem = "jobs",
                    component = "submitter",
                    op = "enqueue",
                    task_id = %task.task_id,
                    task_type = %task.task_type,
                    job_id = %job_id,
                    "Task queued"
                );
                Some(job_id)
            }
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "submitter",
                    task_id = %task.task_id,
                    error = %e,
                    "Enqueue failed, executing synchronously"
                );
                None
            }
        }
    }

    async fn run_synchronously(
        &self,
        task_id: Uuid,
    ) -> std::result::Result<SubmittedTask, SubmitError> {
        let start = Instant::now();
        // Recorded before execution: terminal records no longer accept updates.
        self.repos
            .tasks
            .update_status(task_id, TaskStatusUpdate::job_id(SYNC_EXECUTION_JOB_ID))
            .await?;

        if let Err(source) = self.executor.execute(task_id).await {
            return Err(SubmitError::ExecutionFailed { task_id, source });
        }

        let task = self
            .repos
            .tasks
            .get_unscoped(task_id)
            .await?
            .ok_or(Error::TaskNotFound(task_id))?;
        info!(
            subsystem = "jobs",
            component = "submitter",
            task_id = %task_id,
            status = %task.status,
            duration_ms = start.elapsed().as_millis() as u64,
            "Task executed synchronously"
        );
        Ok(SubmittedTask {
            task,
            mode: SubmissionMode::Synchronous,
        })
    }

    /// Cancel a user's task, and its queue job when it has not started yet.
    pub async fn cancel(&self, task_id: Uuid, user_id: Uuid) -> Result<CancelOutcome> {
        let outcome = self.repos.tasks.cancel(task_id, user_id).await?;

        if let (CancelOutcome::Cancelled(task), Some(queue)) = (&outcome, &self.queue) {
            if let Some(job_id) = task.queue_job_id() {
                match queue.cancel(job_id).await {
                    Ok(removed) => debug!(
                        subsystem = "jobs",
                        component = "submitter",
                        op = "cancel",
                        task_id = %task_id,
                        job_id,
                        removed,
                        "Queue job cancellation requested"
                    ),
                    Err(e) => warn!(
                        subsystem = "jobs",
                        component = "submitter",
                        task_id = %task_id,
                        job_id,
                        error = %e,
                        "Failed to cancel queue job"
                    ),
                }
            }
        }
        Ok(outcome)
    }

    /// `redis` when a background queue is attached, `memory` otherwise.
    pub fn queue_mode(&self) -> QueueMode {
        if self.queue.is_some() {
            QueueMode::Redis
        } else {
            QueueMode::Memory
        }
    }

    pub async fn is_queue_available(&self) -> bool {
        match &self.queue {
            Some(queue) => queue.is_available().await,
            None => false,
        }
    }

    /// Connection status and configuration summary of the queue backend.
    pub async fn redis_status(&self) -> RedisStatus {
        RedisStatus {
            enabled: self.redis_config.enabled,
            connected: self.is_queue_available().await,
            mode: self.queue_mode(),
            host: self.redis_config.host.clone(),
            port: self.redis_config.port,
            db: self.redis_config.db,
        }
    }

    /// Queue counters; all zero when running without a queue.
    pub async fn queue_stats(&self) -> Result<QueueStats> {
        match &self.queue {
            Some(queue) => queue.stats().await,
            None => Ok(QueueStats::default()),
        }
    }
}
