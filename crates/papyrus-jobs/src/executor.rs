//! Task executor: runs one task from `pending` to a terminal state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use papyrus_core::defaults::PROGRESS_STARTED;
use papyrus_core::{
    clamp_progress, Error, GenerationProvider, Repositories, Result, Task, TaskStatus,
    TaskStatusUpdate, TaskType,
};

use crate::extraction::ExtractionRegistry;
use crate::handler::{JobContext, TaskHandler};
use crate::handlers::{ExtractHandler, MindmapHandler, SummarizeHandler};

/// Error text returned when a cancelled task is executed or finishes.
pub const TASK_CANCELLED_MESSAGE: &str = "task cancelled";

/// Text stored in `error_message` for a failed task.
///
/// Variants that carry a user-facing message store it verbatim; everything
/// else keeps its category prefix.
pub fn error_message(err: &Error) -> String {
    match err {
        Error::Config(msg)
        | Error::Job(msg)
        | Error::Extraction(msg)
        | Error::Inference(msg)
        | Error::InvalidInput(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Executes tasks by dispatching them to the handler for their type.
pub struct TaskExecutor {
    repos: Repositories,
    provider: Arc<dyn GenerationProvider>,
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
}

impl TaskExecutor {
    /// Create an executor with no handlers registered.
    pub fn new(repos: Repositories, provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            repos,
            provider,
            handlers: HashMap::new(),
        }
    }

    /// Create an executor with the extract, summarize and mindmap handlers.
    pub fn with_default_handlers(
        repos: Repositories,
        provider: Arc<dyn GenerationProvider>,
        registry: Arc<ExtractionRegistry>,
    ) -> Self {
        let mut executor = Self::new(repos.clone(), provider);
        executor.register(Arc::new(ExtractHandler::new(repos.clone(), registry)));
        executor.register(Arc::new(SummarizeHandler::new(repos.clone())));
        executor.register(Arc::new(MindmapHandler::new(repos)));
        executor
    }

    /// Register a handler for its task type.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        let task_type = handler.task_type();
        self.handlers.insert(task_type, handler);
        debug!(subsystem = "jobs", %task_type, "Registered task handler");
    }

    /// Check if a handler is registered for the task type.
    pub fn has_handler(&self, task_type: TaskType) -> bool {
        self.handlers.contains_key(&task_type)
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    pub fn provider(&self) -> &Arc<dyn GenerationProvider> {
        &self.provider
    }

    /// Execute a task and persist its outcome.
    ///
    /// Returns the handler's output. Failures are written to the task record
    /// before the error is returned. A task that is cancelled while running
    /// keeps its `cancelled` status and its output is discarded. Content rows
    /// are written only after the guarded completion update succeeds.
    pub async fn execute(&self, task_id: Uuid) -> Result<JsonValue> {
        let start = Instant::now();
        let task = self
            .repos
            .tasks
            .get_unscoped(task_id)
            .await?
            .ok_or(Error::TaskNotFound(task_id))?;

        match task.status {
            TaskStatus::Cancelled => {
                debug!(subsystem = "jobs", task_id = %task_id, "Skipping cancelled task");
                return Err(Error::Job(TASK_CANCELLED_MESSAGE.to_string()));
            }
            TaskStatus::Completed => {
                debug!(subsystem = "jobs", task_id = %task_id, "Task already completed");
                return Ok(task.result.unwrap_or(JsonValue::Null));
            }
            TaskStatus::Failed => {
                return Err(Error::Job(
                    task.error_message
                        .unwrap_or_else(|| "Task already failed".to_string()),
                ));
            }
            TaskStatus::Pending | TaskStatus::Processing => {}
        }

        let Some(handler) = self.handlers.get(&task.task_type).cloned() else {
            let err = Error::Job(format!(
                "No handler registered for task type: {}",
                task.task_type
            ));
            return Err(self.fail(task_id, err).await);
        };

        let task = self
            .repos
            .tasks
            .update_status(
                task_id,
                TaskStatusUpdate::status(TaskStatus::Processing).with_progress(PROGRESS_STARTED),
            )
            .await?
            .ok_or(Error::TaskNotFound(task_id))?;
        if task.status == TaskStatus::Cancelled {
            return Err(Error::Job(TASK_CANCELLED_MESSAGE.to_string()));
        }

        info!(
            subsystem = "jobs",
            component = "executor",
            op = "execute",
            task_id = %task_id,
            task_type = %task.task_type,
            "Executing task"
        );

        let output = match self.run_handler(&task, handler).await {
            Ok(output) => output,
            Err(e) => return Err(self.fail(task_id, e).await),
        };

        if self.is_cancelled(task_id).await? {
            info!(
                subsystem = "jobs",
                task_id = %task_id,
                "Task cancelled while running, discarding output"
            );
            return Err(Error::Job(TASK_CANCELLED_MESSAGE.to_string()));
        }

        let updated = self
            .repos
            .tasks
            .update_status(task_id, TaskStatusUpdate::completed(output.clone()))
            .await?
            .ok_or(Error::TaskNotFound(task_id))?;
        if updated.status != TaskStatus::Completed {
            info!(
                subsystem = "jobs",
                task_id = %task_id,
                status = %updated.status,
                "Task finished elsewhere before completion, discarding output"
            );
            return Err(Error::Job(TASK_CANCELLED_MESSAGE.to_string()));
        }

        // The result stays on the task record when the content row cannot be written.
        if let Err(e) = self.persist_content(&task, &output).await {
            warn!(
                subsystem = "jobs",
                task_id = %task_id,
                error = %e,
                "Failed to store generated content"
            );
        }

        info!(
            subsystem = "jobs",
            component = "executor",
            op = "execute",
            task_id = %task_id,
            task_type = %task.task_type,
            duration_ms = start.elapsed().as_millis() as u64,
            "Task completed"
        );
        Ok(output)
    }

    /// Mark a task failed with `message`. Terminal tasks are left unchanged.
    pub async fn mark_failed(&self, task_id: Uuid, message: &str) -> Result<Option<Task>> {
        self.repos
            .tasks
            .update_status(task_id, TaskStatusUpdate::failed(message))
            .await
    }

    /// Resolve the backend if needed, then run the handler with progress persistence.
    async fn run_handler(&self, task: &Task, handler: Arc<dyn TaskHandler>) -> Result<JsonValue> {
        let mut ctx = JobContext::new(task.clone());

        if handler.requires_llm(task) {
            let settings = self
                .repos
                .user_settings
                .get_llm_settings(task.user_id)
                .await?;
            let backend = self.provider.backend_for(settings.as_ref())?;
            debug!(
                subsystem = "jobs",
                task_id = %task.task_id,
                model = %backend.model_name(),
                user_key = settings.as_ref().and_then(|s| s.api_key()).is_some(),
                "Resolved generation backend"
            );
            ctx = ctx.with_backend(backend);
        }

        let task_id = task.task_id;
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<i32>();
        let tasks = self.repos.tasks.clone();
        let forwarder = tokio::spawn(async move {
            let mut last = PROGRESS_STARTED;
            while let Some(percent) = progress_rx.recv().await {
                let percent = clamp_progress(percent);
                if percent <= last {
                    continue;
                }
                last = percent;
                if let Err(e) = tasks
                    .update_status(task_id, TaskStatusUpdate::progress(percent))
                    .await
                {
                    warn!(
                        subsystem = "jobs",
                        task_id = %task_id,
                        error = %e,
                        "Failed to persist task progress"
                    );
                }
            }
        });

        let ctx = ctx.with_progress_callback(move |percent, message| {
            trace!(subsystem = "jobs", task_id = %task_id, percent, ?message, "Task progress");
            let _ = progress_tx.send(percent);
        });

        // The callback (and with it the sender) is dropped when the handler returns.
        let result = handler.execute(ctx).await;
        if let Err(e) = forwarder.await {
            warn!(subsystem = "jobs", task_id = %task_id, error = ?e, "Progress forwarder panicked");
        }
        result
    }

    async fn is_cancelled(&self, task_id: Uuid) -> Result<bool> {
        Ok(self
            .repos
            .tasks
            .get_unscoped(task_id)
            .await?
            .is_some_and(|t| t.status == TaskStatus::Cancelled))
    }

    async fn persist_content(&self, task: &Task, output: &JsonValue) -> Result<()> {
        let (Some(content_type), Some(file_id)) = (task.task_type.content_type(), task.file_id)
        else {
            return Ok(());
        };
        self.repos
            .contents
            .upsert(file_id, content_type, output.clone())
            .await?;
        debug!(
            subsystem = "jobs",
            task_id = %task.task_id,
            file_id = %file_id,
            %content_type,
            "Stored generated content"
        );
        Ok(())
    }

    /// Record the failure on the task and hand the error back.
    async fn fail(&self, task_id: Uuid, err: Error) -> Error {
        let message = error_message(&err);
        error!(
            subsystem = "jobs",
            component = "executor",
            task_id = %task_id,
            error = %message,
            "Task failed"
        );
        if let Err(e) = self.mark_failed(task_id, &message).await {
            error!(
                subsystem = "jobs",
                task_id = %task_id,
                error = %e,
                "Failed to record task failure"
            );
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use async_trait::async_trait;
    use papyrus_core::{
        CancelOutcome, ContentRepository, ContentType, ListTasksRequest, LlmSettings,
        NewDocumentFile, NewTask, TaskPage, TaskRepository, UserSettingsRepository,
    };
    use papyrus_db::MemoryDatabase;
    use papyrus_inference::mock::{MockGenerationBackend, MockProvider};
    use papyrus_inference::MISSING_API_KEY_MESSAGE;
    use serde_json::json;

    struct Fixture {
        db: MemoryDatabase,
        user_id: Uuid,
        file_id: Uuid,
        _file: tempfile::NamedTempFile,
    }

    async fn fixture(body: &str) -> Fixture {
        let db = MemoryDatabase::new();
        let user_id = Uuid::new_v4();
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        let doc = db
            .repositories()
            .documents
            .insert(NewDocumentFile {
                user_id,
                filename: "paper.txt".to_string(),
                mime_type: None,
                size_bytes: body.len() as i64,
                storage_path: file.path().to_string_lossy().to_string(),
            })
            .await
            .unwrap();
        Fixture {
            db,
            user_id,
            file_id: doc.id,
            _file: file,
        }
    }

    fn executor(db: &MemoryDatabase, provider: MockProvider) -> TaskExecutor {
        TaskExecutor::with_default_handlers(
            db.repositories(),
            Arc::new(provider),
            Arc::new(ExtractionRegistry::with_defaults()),
        )
    }

    async fn create(fx: &Fixture, task_type: TaskType, options: Option<JsonValue>) -> Task {
        fx.db
            .repositories()
            .tasks
            .create(NewTask {
                user_id: fx.user_id,
                file_id: Some(fx.file_id),
                task_type,
                options,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_error_message_strips_category() {
        assert_eq!(
            error_message(&Error::Config(MISSING_API_KEY_MESSAGE.to_string())),
            MISSING_API_KEY_MESSAGE
        );
        assert_eq!(
            error_message(&Error::Queue("down".to_string())),
            "Queue error: down"
        );
    }

    #[tokio::test]
    async fn test_execute_extract_completes_and_stores_content() {
        let fx = fixture("Abstract\nReading study.\n\nResults\nPeople skim.").await;
        let task = create(&fx, TaskType::Extract, None).await;
        let provider = MockProvider::without_default_key(MockGenerationBackend::new());

        let output = executor(&fx.db, provider)
            .execute(task.task_id)
            .await
            .unwrap();
        assert_eq!(output["sections"][1]["title"], "Results");

        let stored = fx.db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.progress, 100);
        assert!(stored.started_at.is_some());
        assert!(stored.completed_at.is_some());
        assert_eq!(
            stored.result.as_ref().unwrap()["extracted_text"],
            output["extracted_text"]
        );

        let content = fx
            .db
            .contents
            .get(fx.file_id, ContentType::FileExtraction)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(content.content, output);
    }

    #[tokio::test]
    async fn test_execute_summarize_without_key_fails() {
        let fx = fixture("Some paper text.").await;
        let extract = create(&fx, TaskType::Extract, None).await;
        let exec = executor(
            &fx.db,
            MockProvider::without_default_key(MockGenerationBackend::new()),
        );
        exec.execute(extract.task_id).await.unwrap();

        let task = create(&fx, TaskType::Summarize, None).await;
        let err = exec.execute(task.task_id).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let stored = fx.db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some(MISSING_API_KEY_MESSAGE));
    }

    #[tokio::test]
    async fn test_execute_summarize_with_user_key() {
        let fx = fixture("Some paper text about reading.").await;
        fx.db
            .user_settings
            .set_llm_settings(
                fx.user_id,
                LlmSettings {
                    api_key: Some("sk-user".to_string()),
                    model_name: None,
                },
            )
            .await
            .unwrap();
        let backend = MockGenerationBackend::new()
            .with_fixed_response(r#"{"summary": "About reading.", "key_points": ["reading"]}"#);
        let exec = executor(&fx.db, MockProvider::without_default_key(backend));

        let extract = create(&fx, TaskType::Extract, None).await;
        exec.execute(extract.task_id).await.unwrap();
        let task = create(&fx, TaskType::Summarize, Some(json!({"max_length": 100}))).await;
        exec.execute(task.task_id).await.unwrap();

        let stored = fx.db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        let result = stored.result.unwrap();
        assert_eq!(result["summary"], "About reading.");
        assert_eq!(result["options"]["max_length"], 100);

        let content = fx
            .db
            .contents
            .get(fx.file_id, ContentType::FileSummary)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(content.content["summary"], "About reading.");
    }

    #[tokio::test]
    async fn test_execute_skips_cancelled_task() {
        let fx = fixture("text").await;
        let task = create(&fx, TaskType::Extract, None).await;
        fx.db.tasks.cancel(task.task_id, fx.user_id).await.unwrap();

        let err = executor(&fx.db, MockProvider::new(MockGenerationBackend::new()))
            .execute(task.task_id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Job(ref msg) if msg == TASK_CANCELLED_MESSAGE));

        let stored = fx.db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Cancelled);
        assert!(stored.started_at.is_none());
    }

    #[tokio::test]
    async fn test_execute_completed_task_is_not_rerun() {
        let fx = fixture("Paper body.").await;
        let task = create(&fx, TaskType::Extract, None).await;
        let exec = executor(&fx.db, MockProvider::new(MockGenerationBackend::new()));
        let first = exec.execute(task.task_id).await.unwrap();
        let before = fx.db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();

        let second = exec.execute(task.task_id).await.unwrap();
        let after = fx.db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        assert_eq!(second["extracted_text"], first["extracted_text"]);
        assert_eq!(before.updated_at, after.updated_at);
    }

    #[tokio::test]
    async fn test_execute_unknown_task() {
        let db = MemoryDatabase::new();
        let missing = Uuid::now_v7();
        let err = executor(&db, MockProvider::new(MockGenerationBackend::new()))
            .execute(missing)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_execute_without_handler_fails_task() {
        let fx = fixture("text").await;
        let task = create(&fx, TaskType::Qa, None).await;

        let err = executor(&fx.db, MockProvider::new(MockGenerationBackend::new()))
            .execute(task.task_id)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No handler registered"));
        let stored = fx.db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
    }

    struct CancellingHandler {
        db: MemoryDatabase,
    }

    #[async_trait]
    impl TaskHandler for CancellingHandler {
        fn task_type(&self) -> TaskType {
            TaskType::Mindmap
        }

        fn requires_llm(&self, _task: &Task) -> bool {
            false
        }

        async fn execute(&self, ctx: JobContext) -> Result<JsonValue> {
            self.db.tasks.cancel(ctx.task.task_id, ctx.task.user_id).await?;
            Ok(json!({"mindmap": {"name": "late"}}))
        }
    }

    #[tokio::test]
    async fn test_cancel_during_execution_discards_output() {
        let fx = fixture("text").await;
        let task = create(&fx, TaskType::Mindmap, None).await;
        let mut exec = TaskExecutor::new(
            fx.db.repositories(),
            Arc::new(MockProvider::new(MockGenerationBackend::new())),
        );
        exec.register(Arc::new(CancellingHandler { db: fx.db.clone() }));

        let err = exec.execute(task.task_id).await.unwrap_err();
        assert!(matches!(err, Error::Job(ref msg) if msg == TASK_CANCELLED_MESSAGE));

        let stored = fx.db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Cancelled);
        assert!(fx
            .db
            .contents
            .get(fx.file_id, ContentType::FileMindmap)
            .await
            .unwrap()
            .is_none());
    }

    /// Task store that lets a cancel commit just before the completion update.
    struct CancelBeforeCompletion {
        inner: Arc<dyn TaskRepository>,
    }

    #[async_trait]
    impl TaskRepository for CancelBeforeCompletion {
        async fn create(&self, req: NewTask) -> Result<Task> {
            self.inner.create(req).await
        }

        async fn get(&self, task_id: Uuid, user_id: Uuid) -> Result<Option<Task>> {
            self.inner.get(task_id, user_id).await
        }

        async fn get_unscoped(&self, task_id: Uuid) -> Result<Option<Task>> {
            self.inner.get_unscoped(task_id).await
        }

        async fn update_status(
            &self,
            task_id: Uuid,
            update: TaskStatusUpdate,
        ) -> Result<Option<Task>> {
            if update.status == Some(TaskStatus::Completed) {
                if let Some(task) = self.inner.get_unscoped(task_id).await? {
                    self.inner.cancel(task_id, task.user_id).await?;
                }
            }
            self.inner.update_status(task_id, update).await
        }

        async fn list(&self, user_id: Uuid, req: ListTasksRequest) -> Result<TaskPage> {
            self.inner.list(user_id, req).await
        }

        async fn cancel(&self, task_id: Uuid, user_id: Uuid) -> Result<CancelOutcome> {
            self.inner.cancel(task_id, user_id).await
        }

        async fn latest_for_file(
            &self,
            file_id: Uuid,
            user_id: Uuid,
            task_type: TaskType,
        ) -> Result<Option<Task>> {
            self.inner.latest_for_file(file_id, user_id, task_type).await
        }

        async fn existing_extraction(
            &self,
            file_id: Uuid,
            user_id: Uuid,
        ) -> Result<Option<Task>> {
            self.inner.existing_extraction(file_id, user_id).await
        }
    }

    #[tokio::test]
    async fn test_cancel_racing_completion_leaves_no_content() {
        let fx = fixture("Abstract\nA short paper.").await;
        let task = create(&fx, TaskType::Extract, None).await;
        let mut repos = fx.db.repositories();
        repos.tasks = Arc::new(CancelBeforeCompletion {
            inner: repos.tasks.clone(),
        });
        let exec = TaskExecutor::with_default_handlers(
            repos,
            Arc::new(MockProvider::new(MockGenerationBackend::new())),
            Arc::new(ExtractionRegistry::with_defaults()),
        );

        let err = exec.execute(task.task_id).await.unwrap_err();
        assert!(matches!(err, Error::Job(ref msg) if msg == TASK_CANCELLED_MESSAGE));

        let stored = fx.db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Cancelled);
        assert!(fx
            .db
            .contents
            .get(fx.file_id, ContentType::FileExtraction)
            .await
            .unwrap()
            .is_none());
    }

    struct ProgressHandler;

    #[async_trait]
    impl TaskHandler for ProgressHandler {
        fn task_type(&self) -> TaskType {
            TaskType::Rewrite
        }

        fn requires_llm(&self, _task: &Task) -> bool {
            false
        }

        async fn execute(&self, ctx: JobContext) -> Result<JsonValue> {
            ctx.report_progress(60, None);
            ctx.report_progress(30, None);
            Err(Error::Inference("model overloaded".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failure_keeps_highest_progress() {
        let fx = fixture("text").await;
        let task = create(&fx, TaskType::Rewrite, None).await;
        let mut exec = TaskExecutor::new(
            fx.db.repositories(),
            Arc::new(MockProvider::new(MockGenerationBackend::new())),
        );
        exec.register(Arc::new(ProgressHandler));

        exec.execute(task.task_id).await.unwrap_err();

        let stored = fx.db.tasks.get_unscoped(task.task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.progress, 60);
        assert_eq!(stored.error_message.as_deref(), Some("model overloaded"));
    }
}
