//! SummarizeHandler - summary of a previously extracted document.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use papyrus_core::defaults::{PROGRESS_GENERATED, PROGRESS_TEXT_READY};
use papyrus_core::{Repositories, Result, SummaryOptions, TaskType};
use papyrus_inference::DocumentAnalyzer;

use super::load_extracted_text;
use crate::handler::{JobContext, TaskHandler};

pub struct SummarizeHandler {
    repos: Repositories,
}

impl SummarizeHandler {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }
}

#[async_trait]
impl TaskHandler for SummarizeHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Summarize
    }

    async fn execute(&self, ctx: JobContext) -> Result<JsonValue> {
        let options: SummaryOptions = ctx.options_as();
        let text = load_extracted_text(&self.repos, ctx.file_id()?, ctx.user_id()).await?;
        ctx.report_progress(PROGRESS_TEXT_READY, Some("Extraction loaded"));

        let summary = DocumentAnalyzer::new(ctx.backend()?)
            .summarize(&text, &options)
            .await?;
        ctx.report_progress(PROGRESS_GENERATED, Some("Summary generated"));

        Ok(serde_json::to_value(summary)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::handler::test_support::sample_task;
    use papyrus_core::{ContentType, Error};
    use papyrus_db::MemoryDatabase;
    use papyrus_inference::mock::MockGenerationBackend;
    use serde_json::json;

    #[tokio::test]
    async fn test_summarize_uses_stored_extraction() {
        let db = MemoryDatabase::new();
        let task = sample_task(TaskType::Summarize, Some(json!({"summary_type": "detailed"})));
        db.repositories()
            .contents
            .upsert(
                task.file_id.unwrap(),
                ContentType::FileExtraction,
                json!({"extracted_text": "A long paper about reading behaviour."}),
            )
            .await
            .unwrap();

        let backend = MockGenerationBackend::new().with_fixed_response(
            r#"```json
{"summary": "Paper on reading.", "key_points": ["reading", "behaviour"]}
```"#,
        );
        let ctx = JobContext::new(task).with_backend(Arc::new(backend.clone()));

        let result = SummarizeHandler::new(db.repositories())
            .execute(ctx)
            .await
            .unwrap();

        assert_eq!(result["summary"], "Paper on reading.");
        assert_eq!(result["key_points"], json!(["reading", "behaviour"]));
        assert_eq!(result["statistics"]["summary_length"], 17);
        assert!(backend.get_calls()[0]
            .prompt
            .contains("A long paper about reading behaviour."));
    }

    #[tokio::test]
    async fn test_summarize_without_extraction() {
        let db = MemoryDatabase::new();
        let ctx = JobContext::new(sample_task(TaskType::Summarize, None))
            .with_backend(Arc::new(MockGenerationBackend::new()));

        let err = SummarizeHandler::new(db.repositories())
            .execute(ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_summarize_backend_failure() {
        let db = MemoryDatabase::new();
        let task = sample_task(TaskType::Summarize, None);
        db.repositories()
            .contents
            .upsert(
                task.file_id.unwrap(),
                ContentType::FileExtraction,
                json!({"extracted_text": "text"}),
            )
            .await
            .unwrap();
        let backend = MockGenerationBackend::new().with_failure("upstream unavailable");
        let ctx = JobContext::new(task).with_backend(Arc::new(backend));

        let err = SummarizeHandler::new(db.repositories())
            .execute(ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Inference(ref msg) if msg == "upstream unavailable"));
    }
}
