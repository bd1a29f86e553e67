//! Task handlers for each background task type.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use papyrus_core::{Error, GenerationBackend, Result, Task, TaskType};
use papyrus_inference::MISSING_API_KEY_MESSAGE;

/// Progress callback type for task handlers.
pub type ProgressCallback = Box<dyn Fn(i32, Option<&str>) + Send + Sync>;

/// Context provided to task handlers.
pub struct JobContext {
    /// The task being processed.
    pub task: Task,
    /// Generation backend resolved from the owner's settings.
    backend: Option<Arc<dyn GenerationBackend>>,
    /// Progress callback for updating task progress.
    progress_callback: Option<ProgressCallback>,
}

impl JobContext {
    /// Create a new task context.
    pub fn new(task: Task) -> Self {
        Self {
            task,
            backend: None,
            progress_callback: None,
        }
    }

    /// Attach the generation backend for LLM steps.
    pub fn with_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(i32, Option<&str>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Report progress to the callback.
    pub fn report_progress(&self, percent: i32, message: Option<&str>) {
        if let Some(ref callback) = self.progress_callback {
            callback(percent, message);
        }
    }

    /// Generation backend, or a configuration error when no key was resolved.
    pub fn backend(&self) -> Result<Arc<dyn GenerationBackend>> {
        self.backend
            .clone()
            .ok_or_else(|| Error::Config(MISSING_API_KEY_MESSAGE.to_string()))
    }

    /// Document the task operates on.
    pub fn file_id(&self) -> Result<Uuid> {
        self.task
            .file_id
            .ok_or_else(|| Error::InvalidInput("Task has no associated file".to_string()))
    }

    /// Owner of the task.
    pub fn user_id(&self) -> Uuid {
        self.task.user_id
    }

    /// Task options deserialized into `T`, defaults when absent.
    pub fn options_as<T: DeserializeOwned + Default>(&self) -> T {
        self.task.options_as()
    }
}

/// Trait for task handlers.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The task type this handler processes.
    fn task_type(&self) -> TaskType;

    /// Whether running `task` needs a generation backend.
    fn requires_llm(&self, _task: &Task) -> bool {
        true
    }

    /// Execute the task, returning the result payload.
    async fn execute(&self, ctx: JobContext) -> Result<JsonValue>;

    /// Check if this handler can process the given task type.
    fn can_handle(&self, task_type: TaskType) -> bool {
        self.task_type() == task_type
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::test_support::sample_task;
    use super::*;
    use papyrus_core::{ExtractionOptions, MindmapOptions};
    use papyrus_inference::mock::MockGenerationBackend;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl TaskHandler for EchoHandler {
        fn task_type(&self) -> TaskType {
            TaskType::Summarize
        }

        async fn execute(&self, ctx: JobContext) -> Result<JsonValue> {
            ctx.report_progress(50, Some("halfway"));
            Ok(json!({ "task_id": ctx.task.task_id }))
        }
    }

    #[test]
    fn test_job_context_ids() {
        let task = sample_task(TaskType::Extract, None);
        let ctx = JobContext::new(task.clone());
        assert_eq!(ctx.file_id().unwrap(), task.file_id.unwrap());
        assert_eq!(ctx.user_id(), task.user_id);
    }

    #[test]
    fn test_job_context_missing_file() {
        let mut task = sample_task(TaskType::Extract, None);
        task.file_id = None;
        let ctx = JobContext::new(task);
        assert!(matches!(ctx.file_id(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_job_context_without_backend() {
        let ctx = JobContext::new(sample_task(TaskType::Summarize, None));
        let err = ctx.backend().err().unwrap();
        assert!(matches!(err, Error::Config(ref msg) if msg == MISSING_API_KEY_MESSAGE));
    }

    #[test]
    fn test_job_context_with_backend() {
        let ctx = JobContext::new(sample_task(TaskType::Summarize, None))
            .with_backend(Arc::new(MockGenerationBackend::new()));
        assert_eq!(ctx.backend().unwrap().model_name(), "mock-model");
    }

    #[test]
    fn test_job_context_options() {
        let ctx = JobContext::new(sample_task(
            TaskType::Mindmap,
            Some(json!({"max_depth": 2, "include_keywords": false})),
        ));
        let options: MindmapOptions = ctx.options_as();
        assert_eq!(options.max_depth, 2);
        assert!(!options.include_keywords);

        let ctx = JobContext::new(sample_task(TaskType::Extract, None));
        let options: ExtractionOptions = ctx.options_as();
        assert_eq!(options, ExtractionOptions::default());
    }

    #[tokio::test]
    async fn test_handler_reports_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let ctx = JobContext::new(sample_task(TaskType::Summarize, None))
            .with_progress_callback(move |p, _| seen_clone.lock().unwrap().push(p));

        let handler = EchoHandler;
        assert!(handler.can_handle(TaskType::Summarize));
        assert!(!handler.can_handle(TaskType::Extract));
        assert!(handler.requires_llm(&ctx.task));

        let result = handler.execute(ctx).await.unwrap();
        assert!(result.get("task_id").is_some());
        assert_eq!(*seen.lock().unwrap(), vec![50]);
    }
}
