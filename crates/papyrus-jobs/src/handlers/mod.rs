//! Handlers for the background task types.

mod extract;
mod mindmap;
mod summarize;

pub use extract::ExtractHandler;
pub use mindmap::MindmapHandler;
pub use summarize::SummarizeHandler;

use uuid::Uuid;

use papyrus_core::{ContentType, Error, Repositories, Result};

/// Message used when an analysis task runs before any extraction finished.
pub const EXTRACTION_REQUIRED_MESSAGE: &str = "Document has not been extracted yet";

/// Text of the most recent extraction of a file.
///
/// Prefers the stored `file_extraction` content and falls back to the result
/// of the latest completed extraction task.
pub async fn load_extracted_text(
    repos: &Repositories,
    file_id: Uuid,
    user_id: Uuid,
) -> Result<String> {
    if let Some(content) = repos
        .contents
        .get(file_id, ContentType::FileExtraction)
        .await?
    {
        if let Some(text) = extracted_text(&content.content) {
            return Ok(text);
        }
    }

    repos
        .tasks
        .existing_extraction(file_id, user_id)
        .await?
        .and_then(|task| task.result.as_ref().and_then(extracted_text))
        .ok_or_else(|| Error::InvalidInput(EXTRACTION_REQUIRED_MESSAGE.to_string()))
}

fn extracted_text(value: &serde_json::Value) -> Option<String> {
    value
        .get("extracted_text")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use papyrus_core::{NewTask, TaskStatus, TaskStatusUpdate, TaskType};
    use papyrus_db::MemoryDatabase;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_extracted_text_prefers_content() {
        let db = MemoryDatabase::new();
        let repos = db.repositories();
        let file_id = Uuid::new_v4();
        repos
            .contents
            .upsert(
                file_id,
                ContentType::FileExtraction,
                json!({"extracted_text": "stored text"}),
            )
            .await
            .unwrap();

        let text = load_extracted_text(&repos, file_id, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(text, "stored text");
    }

    #[tokio::test]
    async fn test_load_extracted_text_from_task_result() {
        let db = MemoryDatabase::new();
        let repos = db.repositories();
        let user_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();

        let task = repos
            .tasks
            .create(NewTask {
                user_id,
                file_id: Some(file_id),
                task_type: TaskType::Extract,
                options: None,
            })
            .await
            .unwrap();
        let done = repos
            .tasks
            .update_status(
                task.task_id,
                TaskStatusUpdate::completed(json!({"extracted_text": "from task"})),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        let text = load_extracted_text(&repos, file_id, user_id).await.unwrap();
        assert_eq!(text, "from task");
    }

    #[tokio::test]
    async fn test_load_extracted_text_missing() {
        let db = MemoryDatabase::new();
        let err = load_extracted_text(&db.repositories(), Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::InvalidInput(ref msg) if msg == EXTRACTION_REQUIRED_MESSAGE)
        );
    }
}
