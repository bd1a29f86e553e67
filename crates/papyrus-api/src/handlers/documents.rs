//! Document analysis routes.
//!
//! Extraction, summaries and mind maps run as tasks (queued, or inline when
//! no queue is available). Question answering and rewriting answer directly.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use uuid::Uuid;

use papyrus_core::{
    ContentType, ConversationTurn, DocumentFile, ExtractionOptions, GenerationBackend,
    MindmapOptions, QaAnswer, RewriteOptions, SubmissionMode, SummaryOptions, TaskStatus,
    TaskType,
};
use papyrus_inference::DocumentAnalyzer;
use papyrus_jobs::{handlers::load_extracted_text, ContentCheck, SubmittedTask};

use crate::{ApiError, ApiJson, ApiResponse, AppState, CurrentUser, OptionalJson};

const QUESTION_MAX_CHARS: usize = 1000;
const REWRITE_MIN_CHARS: usize = 10;
const REWRITE_MAX_CHARS: usize = 10_000;

async fn owned_file(
    state: &AppState,
    file_id: Uuid,
    user_id: Uuid,
) -> Result<DocumentFile, ApiError> {
    state
        .repos
        .documents
        .get(file_id, user_id)
        .await?
        .ok_or(ApiError::FileNotFound(file_id))
}

async fn backend_for_user(
    state: &AppState,
    user_id: Uuid,
) -> Result<Arc<dyn GenerationBackend>, ApiError> {
    let settings = state.repos.user_settings.get_llm_settings(user_id).await?;
    Ok(state.provider.backend_for(settings.as_ref())?)
}

/// Accepted task, returned with 202.
#[derive(Debug, Serialize)]
pub struct TaskAccepted {
    pub task_id: Uuid,
    pub file_id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub mode: SubmissionMode,
}

impl TaskAccepted {
    fn response(file_id: Uuid, submitted: SubmittedTask) -> Response {
        let task = submitted.task;
        (
            StatusCode::ACCEPTED,
            ApiResponse::ok(Self {
                task_id: task.task_id,
                file_id,
                task_type: task.task_type,
                status: task.status,
                mode: submitted.mode,
            }),
        )
            .into_response()
    }
}

async fn submit(
    state: &AppState,
    user_id: Uuid,
    file_id: Uuid,
    task_type: TaskType,
    options: Option<JsonValue>,
) -> Result<Response, ApiError> {
    let submitted = state
        .submitter
        .submit(user_id, file_id, task_type, options)
        .await?;
    info!(
        subsystem = "api",
        task_id = %submitted.task.task_id,
        %task_type,
        file_id = %file_id,
        mode = ?submitted.mode,
        "Task submitted"
    );
    Ok(TaskAccepted::response(file_id, submitted))
}

#[derive(Debug, Serialize)]
pub struct ExtractionView {
    pub task_id: Uuid,
    pub file_id: Uuid,
    pub status: TaskStatus,
    pub result: Option<JsonValue>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// POST /api/v1/documents/:file_id/extract
///
/// Returns the existing result with 200 when the document was already
/// extracted, otherwise starts an extraction task.
pub async fn extract_document(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(file_id): Path<Uuid>,
    OptionalJson(options): OptionalJson<ExtractionOptions>,
) -> Result<Response, ApiError> {
    owned_file(&state, file_id, user_id).await?;

    if let Some(task) = state
        .repos
        .tasks
        .existing_extraction(file_id, user_id)
        .await?
        .filter(|t| t.result.is_some())
    {
        debug!(
            subsystem = "api",
            task_id = %task.task_id,
            file_id = %file_id,
            "Returning existing extraction"
        );
        return Ok(ApiResponse::ok(ExtractionView {
            task_id: task.task_id,
            file_id,
            status: task.status,
            result: task.result,
            completed_at: task.completed_at,
        })
        .into_response());
    }

    let options = options
        .map(serde_json::to_value)
        .transpose()
        .map_err(papyrus_core::Error::from)?;
    submit(&state, user_id, file_id, TaskType::Extract, options).await
}

/// GET /api/v1/documents/:file_id/extraction
pub async fn get_extraction(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(file_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ExtractionView>>, ApiError> {
    owned_file(&state, file_id, user_id).await?;

    let task = state
        .repos
        .tasks
        .existing_extraction(file_id, user_id)
        .await?
        .ok_or(ApiError::ExtractionNotFound(file_id))?;
    Ok(ApiResponse::ok(ExtractionView {
        task_id: task.task_id,
        file_id,
        status: task.status,
        result: task.result,
        completed_at: task.completed_at,
    }))
}

/// Checks shared by the summary and mind map routes before a task is created.
async fn prepare_analysis(state: &AppState, user_id: Uuid, file_id: Uuid) -> Result<(), ApiError> {
    owned_file(state, file_id, user_id).await?;
    load_extracted_text(&state.repos, file_id, user_id).await?;
    backend_for_user(state, user_id).await?;
    Ok(())
}

/// POST /api/v1/documents/:file_id/summarize
pub async fn summarize_document(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(file_id): Path<Uuid>,
    options: OptionalJson<SummaryOptions>,
) -> Result<Response, ApiError> {
    prepare_analysis(&state, user_id, file_id).await?;
    let options = options.unwrap_or_default();
    let options = serde_json::to_value(options).map_err(papyrus_core::Error::from)?;
    submit(&state, user_id, file_id, TaskType::Summarize, Some(options)).await
}

/// POST /api/v1/documents/:file_id/mindmap
pub async fn generate_mindmap(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(file_id): Path<Uuid>,
    options: OptionalJson<MindmapOptions>,
) -> Result<Response, ApiError> {
    prepare_analysis(&state, user_id, file_id).await?;
    let options = options.unwrap_or_default();
    let options = serde_json::to_value(options).map_err(papyrus_core::Error::from)?;
    submit(&state, user_id, file_id, TaskType::Mindmap, Some(options)).await
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct QaRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default = "default_true")]
    pub include_sources: bool,
    #[serde(default = "default_true")]
    pub include_suggestions: bool,
}

/// POST /api/v1/documents/:file_id/qa
pub async fn question_answer(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(file_id): Path<Uuid>,
    ApiJson(request): ApiJson<QaRequest>,
) -> Result<Json<ApiResponse<QaAnswer>>, ApiError> {
    let question_chars = request.question.trim().chars().count();
    if question_chars == 0 || question_chars > QUESTION_MAX_CHARS {
        return Err(ApiError::BadRequest(format!(
            "question must be between 1 and {} characters",
            QUESTION_MAX_CHARS
        )));
    }

    owned_file(&state, file_id, user_id).await?;
    let text = load_extracted_text(&state.repos, file_id, user_id).await?;
    let backend = backend_for_user(&state, user_id).await?;

    let mut answer = DocumentAnalyzer::new(backend)
        .answer_question(&text, &request.question, &request.history)
        .await
        .map_err(|e| ApiError::operation("QA_FAILED", e))?;
    if !request.include_sources {
        answer.sources.clear();
    }
    if !request.include_suggestions {
        answer.suggested_questions.clear();
    }

    Ok(ApiResponse::ok(answer))
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    pub text: String,
    #[serde(flatten)]
    pub options: RewriteOptions,
}

#[derive(Debug, Serialize)]
pub struct RewriteView {
    pub rewritten_text: String,
    pub improvements: Vec<String>,
    pub original_length: usize,
    pub rewritten_length: usize,
}

/// POST /api/v1/documents/:file_id/rewrite
pub async fn rewrite_text(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(file_id): Path<Uuid>,
    ApiJson(request): ApiJson<RewriteRequest>,
) -> Result<Json<ApiResponse<RewriteView>>, ApiError> {
    let original_length = request.text.chars().count();
    if !(REWRITE_MIN_CHARS..=REWRITE_MAX_CHARS).contains(&original_length) {
        return Err(ApiError::BadRequest(format!(
            "text must be between {} and {} characters",
            REWRITE_MIN_CHARS, REWRITE_MAX_CHARS
        )));
    }

    owned_file(&state, file_id, user_id).await?;
    let backend = backend_for_user(&state, user_id).await?;

    let result = DocumentAnalyzer::new(backend)
        .rewrite(&request.text, &request.options)
        .await
        .map_err(|e| ApiError::operation("REWRITE_FAILED", e))?;

    Ok(ApiResponse::ok(RewriteView {
        rewritten_length: result.rewritten_text.chars().count(),
        rewritten_text: result.rewritten_text,
        improvements: result.improvements,
        original_length,
    }))
}

/// GET /api/v1/documents/:file_id/content/:content_type
pub async fn get_content(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((file_id, content_type)): Path<(Uuid, String)>,
) -> Result<Json<ApiResponse<ContentCheck>>, ApiError> {
    let content_type = content_type
        .parse::<ContentType>()
        .map_err(ApiError::BadRequest)?;
    let check = state
        .reconciler
        .check_content(file_id, user_id, content_type)
        .await?;
    Ok(ApiResponse::ok(check))
}
