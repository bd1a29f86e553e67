//! MindmapHandler - topic tree of a previously extracted document.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use papyrus_core::defaults::{PROGRESS_GENERATED, PROGRESS_TEXT_READY};
use papyrus_core::{MindmapOptions, Repositories, Result, TaskType};
use papyrus_inference::DocumentAnalyzer;

use super::load_extracted_text;
use crate::handler::{JobContext, TaskHandler};

pub struct MindmapHandler {
    repos: Repositories,
}

impl MindmapHandler {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }
}

#[async_trait]
impl TaskHandler for MindmapHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Mindmap
    }

    async fn execute(&self, ctx: JobContext) -> Result<JsonValue> {
        let options: MindmapOptions = ctx.options_as();
        let text = load_extracted_text(&self.repos, ctx.file_id()?, ctx.user_id()).await?;
        ctx.report_progress(PROGRESS_TEXT_READY, Some("Extraction loaded"));

        let mindmap = DocumentAnalyzer::new(ctx.backend()?)
            .mindmap(&text, &options)
            .await?;
        ctx.report_progress(PROGRESS_GENERATED, Some("Mindmap generated"));

        Ok(serde_json::to_value(mindmap)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::handler::test_support::sample_task;
    use papyrus_core::ContentType;
    use papyrus_db::MemoryDatabase;
    use papyrus_inference::mock::MockGenerationBackend;
    use serde_json::json;

    async fn extracted(db: &MemoryDatabase, options: Option<JsonValue>) -> JobContext {
        let task = sample_task(TaskType::Mindmap, options);
        db.repositories()
            .contents
            .upsert(
                task.file_id.unwrap(),
                ContentType::FileExtraction,
                json!({"extracted_text": "Transformers replace recurrence with attention."}),
            )
            .await
            .unwrap();
        JobContext::new(task)
    }

    #[tokio::test]
    async fn test_mindmap_truncates_to_requested_depth() {
        let db = MemoryDatabase::new();
        let ctx = extracted(&db, Some(json!({"max_depth": 1}))).await;
        let backend = MockGenerationBackend::new().with_fixed_response(
            r#"{"mindmap": {"name": "Transformer", "children": [
                {"name": "Attention", "children": [{"name": "Multi-head"}]},
                {"name": "Training"}
            ]}, "keywords": ["attention"]}"#,
        );

        let result = MindmapHandler::new(db.repositories())
            .execute(ctx.with_backend(Arc::new(backend)))
            .await
            .unwrap();

        assert_eq!(result["mindmap"]["name"], "Transformer");
        assert_eq!(result["mindmap"]["children"][0]["children"], json!([]));
        assert_eq!(result["structure"]["total_branches"], 2);
        assert_eq!(result["structure"]["max_depth"], 1);
        assert_eq!(result["structure"]["main_topics"], json!(["Attention", "Training"]));
        assert_eq!(result["keywords"], json!(["attention"]));
    }

    #[tokio::test]
    async fn test_mindmap_unparseable_reply_falls_back() {
        let db = MemoryDatabase::new();
        let ctx = extracted(&db, None).await;
        let backend = MockGenerationBackend::new().with_fixed_response("no idea");

        let result = MindmapHandler::new(db.repositories())
            .execute(ctx.with_backend(Arc::new(backend)))
            .await
            .unwrap();

        assert_eq!(result["mindmap"], json!({"name": "Document", "children": []}));
        assert_eq!(result["structure"]["total_branches"], 0);
    }
}
