//! # papyrus-api
//!
//! HTTP surface of the papyrus reading assistant: task status and control,
//! document analysis routes, queue status and health.

pub mod auth;
pub mod body;
pub mod error;
pub mod handlers;
pub mod request_id;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;

use papyrus_core::defaults::{MAX_BODY_SIZE_BYTES, UPLOAD_DIR};
use papyrus_core::{GenerationProvider, Repositories};
use papyrus_jobs::{JobQueue, RedisConfig, StatusReconciler, TaskExecutor, TaskSubmitter};

pub use auth::CurrentUser;
pub use body::{ApiJson, OptionalJson};
pub use error::ApiError;
pub use request_id::MakeRequestUuidV7;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    /// Creates tasks and routes them to the queue or runs them inline.
    pub submitter: Arc<TaskSubmitter>,
    /// Brings task records in line with the queue on read.
    pub reconciler: StatusReconciler,
    /// Builds generation backends for the synchronous QA and rewrite routes.
    pub provider: Arc<dyn GenerationProvider>,
    /// Root directory for uploaded documents, one subdirectory per user.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        executor: Arc<TaskExecutor>,
        queue: Option<Arc<dyn JobQueue>>,
        redis_config: RedisConfig,
    ) -> Self {
        let repos = executor.repositories().clone();
        let provider = executor.provider().clone();
        Self {
            reconciler: StatusReconciler::new(repos.clone(), queue.clone()),
            submitter: Arc::new(TaskSubmitter::new(
                repos.clone(),
                executor,
                queue,
                redis_config,
            )),
            repos,
            provider,
            upload_dir: PathBuf::from(UPLOAD_DIR),
            max_upload_bytes: MAX_BODY_SIZE_BYTES,
        }
    }

    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }
}

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Build the application router without the transport layers added in `main`.
pub fn router(state: AppState) -> Router {
    use handlers::{documents, files, system, tasks, users};

    // Multipart uploads are checked against the configured size in the handler.
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes.saturating_add(64 * 1024));

    Router::new()
        .route("/health", get(system::health_check))
        .route("/api/v1/queue/status", get(system::queue_status))
        // Tasks
        .route("/api/v1/tasks", get(tasks::list_tasks))
        .route("/api/v1/tasks/:id", get(tasks::get_task))
        .route("/api/v1/tasks/:id/cancel", post(tasks::cancel_task))
        // User settings
        .route("/api/v1/users/me/settings", get(users::get_settings))
        .route(
            "/api/v1/users/me/api-key",
            put(users::update_api_key).delete(users::clear_api_key),
        )
        .route(
            "/api/v1/users/me/preferences",
            put(users::update_preferences),
        )
        // Documents
        .route(
            "/api/v1/documents",
            get(files::list_documents)
                .post(files::upload_document)
                .layer(upload_limit),
        )
        .route(
            "/api/v1/documents/:file_id/extract",
            post(documents::extract_document),
        )
        .route(
            "/api/v1/documents/:file_id/extraction",
            get(documents::get_extraction),
        )
        .route(
            "/api/v1/documents/:file_id/summarize",
            post(documents::summarize_document),
        )
        .route(
            "/api/v1/documents/:file_id/mindmap",
            post(documents::generate_mindmap),
        )
        .route(
            "/api/v1/documents/:file_id/qa",
            post(documents::question_answer),
        )
        .route(
            "/api/v1/documents/:file_id/rewrite",
            post(documents::rewrite_text),
        )
        .route(
            "/api/v1/documents/:file_id/content/:content_type",
            get(documents::get_content),
        )
        .with_state(state)
}
