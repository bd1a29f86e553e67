//! Reconciles transient queue-job status with durable task records.
//!
//! The task record is authoritative. Queue state only ever moves a record
//! forward (`pending → processing → terminal`); it never regresses a record
//! and never overwrites `cancelled`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use papyrus_core::{
    ContentType, DocumentContent, Error, QueueJobStatus, Repositories, Result, Task, TaskStatus,
    TaskStatusUpdate,
};

use crate::queue::JobQueue;

/// Error stored when the queue reports a failure without a message.
pub const DEFAULT_JOB_FAILURE: &str = "Background job failed";

/// Availability of a generated content kind for a document.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContentCheck {
    /// Content is stored and ready.
    Ready { content: DocumentContent },
    /// The producing task completed but no content row exists; its result is returned.
    Completed { task_id: Uuid, result: JsonValue },
    /// No task has been created for this content.
    NotStarted,
    /// The producing task is still pending or processing.
    InProgress {
        task_id: Uuid,
        status: TaskStatus,
        progress: i32,
    },
    /// The producing task failed.
    Failed { task_id: Uuid, error: String },
    /// The producing task was cancelled.
    Cancelled { task_id: Uuid },
}

/// Brings task records in line with their queue jobs on read.
#[derive(Clone)]
pub struct StatusReconciler {
    repos: Repositories,
    queue: Option<Arc<dyn JobQueue>>,
}

impl StatusReconciler {
    pub fn new(repos: Repositories, queue: Option<Arc<dyn JobQueue>>) -> Self {
        Self { repos, queue }
    }

    /// Fetch a user's task, applying any forward progress reported by the queue.
    pub async fn reconcile(&self, task_id: Uuid, user_id: Uuid) -> Result<Option<Task>> {
        let Some(task) = self.repos.tasks.get(task_id, user_id).await? else {
            return Ok(None);
        };
        self.reconcile_task(task).await.map(Some)
    }

    async fn reconcile_task(&self, task: Task) -> Result<Task> {
        if task.status.is_terminal() {
            return Ok(task);
        }
        let (Some(queue), Some(job_id)) = (&self.queue, task.queue_job_id()) else {
            return Ok(task);
        };
        if !queue.is_available().await {
            return Ok(task);
        }

        let job_status = match queue.job_status(job_id).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                debug!(
                    subsystem = "jobs",
                    component = "reconciler",
                    task_id = %task.task_id,
                    job_id,
                    "Queue job no longer exists, keeping record"
                );
                return Ok(task);
            }
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "reconciler",
                    task_id = %task.task_id,
                    job_id,
                    error = %e,
                    "Failed to read queue job status"
                );
                return Ok(task);
            }
        };

        let mapped = job_status.to_task_status();
        if !task.status.can_advance_to(mapped) {
            return Ok(task);
        }

        let mut update = TaskStatusUpdate::status(mapped);
        if mapped == TaskStatus::Completed {
            update = update.with_progress(100);
        }
        if job_status == QueueJobStatus::Failed && task.error_message.is_none() {
            let error = queue
                .job_error(job_id)
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| DEFAULT_JOB_FAILURE.to_string());
            update.error_message = Some(error);
        }

        debug!(
            subsystem = "jobs",
            component = "reconciler",
            op = "reconcile",
            task_id = %task.task_id,
            job_id,
            from = %task.status,
            to = %mapped,
            "Advancing task from queue status"
        );
        let task_id = task.task_id;
        Ok(self
            .repos
            .tasks
            .update_status(task_id, update)
            .await?
            .unwrap_or(task))
    }

    /// Report whether generated content of a kind is available for a user's file.
    pub async fn check_content(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        content_type: ContentType,
    ) -> Result<ContentCheck> {
        self.repos
            .documents
            .get(file_id, user_id)
            .await?
            .ok_or(Error::FileNotFound(file_id))?;

        if let Some(content) = self.repos.contents.get(file_id, content_type).await? {
            return Ok(ContentCheck::Ready { content });
        }

        let Some(task) = self
            .repos
            .tasks
            .latest_for_file(file_id, user_id, content_type.task_type())
            .await?
        else {
            return Ok(ContentCheck::NotStarted);
        };
        let task = self.reconcile_task(task).await?;
        let task_id = task.task_id;

        Ok(match task.status {
            TaskStatus::Completed => {
                match self.repos.contents.get(file_id, content_type).await? {
                    Some(content) => ContentCheck::Ready { content },
                    None => ContentCheck::Completed {
                        task_id,
                        result: task.result.unwrap_or(JsonValue::Null),
                    },
                }
            }
            TaskStatus::Failed => ContentCheck::Failed {
                task_id,
                error: task
                    .error_message
                    .unwrap_or_else(|| DEFAULT_JOB_FAILURE.to_string()),
            },
            TaskStatus::Cancelled => ContentCheck::Cancelled { task_id },
            TaskStatus::Pending | TaskStatus::Processing => ContentCheck::InProgress {
                task_id,
                status: task.status,
                progress: task.progress,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryJobQueue;
    use chrono::Utc;
    use papyrus_core::{
        ContentRepository, NewDocumentFile, NewTask, QueuedJob, TaskRepository, TaskType,
    };
    use papyrus_db::MemoryDatabase;
    use serde_json::json;

    struct Fixture {
        db: MemoryDatabase,
        queue: Arc<MemoryJobQueue>,
        reconciler: StatusReconciler,
        user_id: Uuid,
        file_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let db = MemoryDatabase::new();
        let queue = Arc::new(MemoryJobQueue::new());
        let user_id = Uuid::new_v4();
        let doc = db
            .repositories()
            .documents
            .insert(NewDocumentFile {
                user_id,
                filename: "paper.pdf".to_string(),
                mime_type: Some("application/pdf".to_string()),
                size_bytes: 1024,
                storage_path: "/tmp/paper.pdf".to_string(),
            })
            .await
            .unwrap();
        let reconciler = StatusReconciler::new(db.repositories(), Some(queue.clone()));
        Fixture {
            db,
            queue,
            reconciler,
            user_id,
            file_id: doc.id,
        }
    }

    /// Create a task and enqueue a job for it, returning both ids.
    async fn queued_task(fx: &Fixture, task_type: TaskType) -> (Uuid, String) {
        let task = fx
            .db
            .tasks
            .create(NewTask {
                user_id: fx.user_id,
                file_id: Some(fx.file_id),
                task_type,
                options: None,
            })
            .await
            .unwrap();
        let job = QueuedJob {
            job_id: Uuid::new_v4().to_string(),
            task_id: task.task_id,
            task_type,
            enqueued_at: Utc::now(),
        };
        fx.queue.enqueue(&job).await.unwrap();
        fx.db
            .tasks
            .update_status(task.task_id, TaskStatusUpdate::job_id(&job.job_id))
            .await
            .unwrap();
        (task.task_id, job.job_id)
    }

    #[tokio::test]
    async fn test_reconcile_advances_to_processing() {
        let fx = fixture().await;
        let (task_id, job_id) = queued_task(&fx, TaskType::Extract).await;
        fx.queue
            .set_job_status(&job_id, QueueJobStatus::Started, None)
            .await
            .unwrap();

        let task = fx.reconciler.reconcile(task_id, fx.user_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(task.started_at.is_some());
    }

    #[tokio::test]
    async fn test_reconcile_finished_job_completes_with_full_progress() {
        let fx = fixture().await;
        let (task_id, job_id) = queued_task(&fx, TaskType::Extract).await;
        fx.queue
            .set_job_status(&job_id, QueueJobStatus::Finished, None)
            .await
            .unwrap();

        let task = fx.reconciler.reconcile(task_id, fx.user_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_reconcile_failed_job_stores_queue_error() {
        let fx = fixture().await;
        let (task_id, job_id) = queued_task(&fx, TaskType::Extract).await;
        fx.queue
            .set_job_status(&job_id, QueueJobStatus::Failed, Some("worker crashed"))
            .await
            .unwrap();

        let task = fx.reconciler.reconcile(task_id, fx.user_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_message.as_deref(), Some("worker crashed"));
    }

    #[tokio::test]
    async fn test_reconcile_failed_job_default_error() {
        let fx = fixture().await;
        let (task_id, job_id) = queued_task(&fx, TaskType::Extract).await;
        fx.queue
            .set_job_status(&job_id, QueueJobStatus::Failed, None)
            .await
            .unwrap();

        let task = fx.reconciler.reconcile(task_id, fx.user_id).await.unwrap().unwrap();
        assert_eq!(task.error_message.as_deref(), Some(DEFAULT_JOB_FAILURE));
    }

    #[tokio::test]
    async fn test_reconcile_never_regresses() {
        let fx = fixture().await;
        let (task_id, _job_id) = queued_task(&fx, TaskType::Extract).await;
        fx.db
            .tasks
            .update_status(task_id, TaskStatusUpdate::status(TaskStatus::Processing))
            .await
            .unwrap();

        // Queue still says "queued"
        let task = fx.reconciler.reconcile(task_id, fx.user_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn test_reconcile_never_overwrites_cancelled() {
        let fx = fixture().await;
        let (task_id, job_id) = queued_task(&fx, TaskType::Extract).await;
        fx.db.tasks.cancel(task_id, fx.user_id).await.unwrap();
        fx.queue
            .set_job_status(&job_id, QueueJobStatus::Finished, None)
            .await
            .unwrap();

        let task = fx.reconciler.reconcile(task_id, fx.user_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_reconcile_vanished_job_leaves_record() {
        let fx = fixture().await;
        let task = fx
            .db
            .tasks
            .create(NewTask {
                user_id: fx.user_id,
                file_id: Some(fx.file_id),
                task_type: TaskType::Extract,
                options: None,
            })
            .await
            .unwrap();
        fx.db
            .tasks
            .update_status(task.task_id, TaskStatusUpdate::job_id("expired-job"))
            .await
            .unwrap();

        let task = fx
            .reconciler
            .reconcile(task.task_id, fx.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_reconcile_foreign_task_is_missing() {
        let fx = fixture().await;
        let (task_id, _) = queued_task(&fx, TaskType::Extract).await;
        assert!(fx
            .reconciler
            .reconcile(task_id, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_check_content_states() {
        let fx = fixture().await;
        let check = fx
            .reconciler
            .check_content(fx.file_id, fx.user_id, ContentType::FileSummary)
            .await
            .unwrap();
        assert!(matches!(check, ContentCheck::NotStarted));

        let (task_id, job_id) = queued_task(&fx, TaskType::Summarize).await;
        fx.queue
            .set_job_status(&job_id, QueueJobStatus::Started, None)
            .await
            .unwrap();
        let check = fx
            .reconciler
            .check_content(fx.file_id, fx.user_id, ContentType::FileSummary)
            .await
            .unwrap();
        assert!(matches!(
            check,
            ContentCheck::InProgress { task_id: id, status: TaskStatus::Processing, .. } if id == task_id
        ));

        fx.db
            .tasks
            .update_status(task_id, TaskStatusUpdate::completed(json!({"summary": "done"})))
            .await
            .unwrap();
        let check = fx
            .reconciler
            .check_content(fx.file_id, fx.user_id, ContentType::FileSummary)
            .await
            .unwrap();
        let ContentCheck::Completed { result, .. } = check else {
            panic!("expected completed without content row");
        };
        assert_eq!(result["summary"], "done");

        fx.db
            .contents
            .upsert(fx.file_id, ContentType::FileSummary, json!({"summary": "done"}))
            .await
            .unwrap();
        let check = fx
            .reconciler
            .check_content(fx.file_id, fx.user_id, ContentType::FileSummary)
            .await
            .unwrap();
        assert!(matches!(check, ContentCheck::Ready { .. }));
    }

    #[tokio::test]
    async fn test_check_content_failed_and_cancelled() {
        let fx = fixture().await;
        let (failed_id, job_id) = queued_task(&fx, TaskType::Mindmap).await;
        fx.queue
            .set_job_status(&job_id, QueueJobStatus::Failed, Some("model timeout"))
            .await
            .unwrap();
        let check = fx
            .reconciler
            .check_content(fx.file_id, fx.user_id, ContentType::FileMindmap)
            .await
            .unwrap();
        assert!(matches!(
            check,
            ContentCheck::Failed { task_id, ref error } if task_id == failed_id && error == "model timeout"
        ));

        let (cancelled_id, _) = queued_task(&fx, TaskType::Extract).await;
        fx.db.tasks.cancel(cancelled_id, fx.user_id).await.unwrap();
        let check = fx
            .reconciler
            .check_content(fx.file_id, fx.user_id, ContentType::FileExtraction)
            .await
            .unwrap();
        assert!(matches!(check, ContentCheck::Cancelled { task_id } if task_id == cancelled_id));
    }

    #[tokio::test]
    async fn test_check_content_foreign_file() {
        let fx = fixture().await;
        let err = fx
            .reconciler
            .check_content(fx.file_id, Uuid::new_v4(), ContentType::FileSummary)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(id) if id == fx.file_id));
    }

    #[test]
    fn test_content_check_serialization() {
        let task_id = Uuid::nil();
        let value = serde_json::to_value(ContentCheck::InProgress {
            task_id,
            status: TaskStatus::Pending,
            progress: 0,
        })
        .unwrap();
        assert_eq!(value["state"], "in_progress");
        assert_eq!(value["status"], "pending");
        assert_eq!(
            serde_json::to_value(ContentCheck::NotStarted).unwrap(),
            json!({"state": "not_started"})
        );
    }
}
