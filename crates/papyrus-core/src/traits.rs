//! Core traits for papyrus abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// TASK REPOSITORY
// =============================================================================

/// Durable storage for task records.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new `pending` task. Options are stored as `{"options": ...}` in `result`.
    async fn create(&self, req: NewTask) -> Result<Task>;

    /// Fetch a task owned by `user_id`. Foreign tasks are reported as missing.
    async fn get(&self, task_id: Uuid, user_id: Uuid) -> Result<Option<Task>>;

    /// Fetch a task regardless of owner.
    async fn get_unscoped(&self, task_id: Uuid) -> Result<Option<Task>>;

    /// Apply a partial update. Returns the updated task, or `None` if it does not exist.
    ///
    /// Terminal tasks are never modified; the current record is returned unchanged.
    async fn update_status(&self, task_id: Uuid, update: TaskStatusUpdate)
        -> Result<Option<Task>>;

    /// List a user's tasks, newest first.
    async fn list(&self, user_id: Uuid, req: ListTasksRequest) -> Result<TaskPage>;

    /// Move a non-terminal task to `cancelled`.
    async fn cancel(&self, task_id: Uuid, user_id: Uuid) -> Result<CancelOutcome>;

    /// Most recent task of a type for a file.
    async fn latest_for_file(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        task_type: TaskType,
    ) -> Result<Option<Task>>;

    /// Most recent completed extraction task for a file.
    async fn existing_extraction(&self, file_id: Uuid, user_id: Uuid) -> Result<Option<Task>>;
}

// =============================================================================
// DOCUMENT REPOSITORIES
// =============================================================================

/// Storage for uploaded document records.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Register an uploaded document.
    async fn insert(&self, req: NewDocumentFile) -> Result<DocumentFile>;

    /// Fetch a document owned by `user_id`.
    async fn get(&self, file_id: Uuid, user_id: Uuid) -> Result<Option<DocumentFile>>;

    /// Fetch a document regardless of owner.
    async fn get_unscoped(&self, file_id: Uuid) -> Result<Option<DocumentFile>>;

    /// A user's documents, newest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<DocumentFile>>;
}

/// Storage for content generated from documents.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Insert or replace the content of a given type for a file.
    async fn upsert(
        &self,
        file_id: Uuid,
        content_type: ContentType,
        content: JsonValue,
    ) -> Result<DocumentContent>;

    /// Fetch stored content of a given type for a file.
    async fn get(&self, file_id: Uuid, content_type: ContentType)
        -> Result<Option<DocumentContent>>;
}

/// Storage for per-user LLM settings.
#[async_trait]
pub trait UserSettingsRepository: Send + Sync {
    /// Fetch the LLM settings of a user, if any were saved.
    async fn get_llm_settings(&self, user_id: Uuid) -> Result<Option<LlmSettings>>;

    /// Save the LLM settings of a user.
    async fn set_llm_settings(&self, user_id: Uuid, settings: LlmSettings) -> Result<()>;
}

/// Bundle of repository handles shared by services.
#[derive(Clone)]
pub struct Repositories {
    pub tasks: Arc<dyn TaskRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub contents: Arc<dyn ContentRepository>,
    pub user_settings: Arc<dyn UserSettingsRepository>,
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Builds generation backends for a user's credentials.
pub trait GenerationProvider: Send + Sync {
    /// Whether a server-wide API key is configured.
    fn has_default_key(&self) -> bool;

    /// Build a backend from the user's settings, falling back to the server key.
    ///
    /// Fails with `Error::Config` when no API key is available.
    fn backend_for(&self, settings: Option<&LlmSettings>) -> Result<Arc<dyn GenerationBackend>>;
}

// =============================================================================
// EXTRACTION TRAITS
// =============================================================================

/// Raw text pulled out of a document by an adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExtraction {
    pub text: String,
    /// Page count reported by the document itself (PDF only).
    pub page_count: Option<usize>,
    /// Adapter-specific metadata.
    pub metadata: JsonValue,
}

/// Adapter for extracting text from one document format.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// The format this adapter handles.
    fn file_type(&self) -> FileType;

    /// Extract text from raw file data.
    async fn extract(&self, data: &[u8], filename: &str) -> Result<RawExtraction>;

    /// Check if the adapter's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this adapter.
    fn name(&self) -> &str;
}
