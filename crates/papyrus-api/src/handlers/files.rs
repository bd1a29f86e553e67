//! Document upload and listing.

use std::path::Path as FsPath;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use papyrus_core::{new_v7, DocumentFile, FileType, NewDocumentFile};

use crate::{ApiError, ApiResponse, AppState, CurrentUser};

/// Document as returned to clients; the storage path stays server-side.
#[derive(Debug, Serialize)]
pub struct DocumentView {
    pub file_id: Uuid,
    pub filename: String,
    pub file_type: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DocumentFile> for DocumentView {
    fn from(file: DocumentFile) -> Self {
        Self {
            file_id: file.id,
            filename: file.filename,
            file_type: file.file_type,
            mime_type: file.mime_type,
            size_bytes: file.size_bytes,
            created_at: file.created_at,
        }
    }
}

struct UploadedFile {
    filename: String,
    mime_type: Option<String>,
    data: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        // Only the final path component of the client's name is kept.
        let filename = field
            .file_name()
            .and_then(|name| FsPath::new(name).file_name())
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("Uploaded file has no name".to_string()))?;
        let mime_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?
            .to_vec();
        return Ok(UploadedFile {
            filename,
            mime_type,
            data,
        });
    }
    Err(ApiError::BadRequest(
        "Missing file in multipart form".to_string(),
    ))
}

/// POST /api/v1/documents
///
/// Multipart form with a `file` field (PDF, DOCX or plain text).
pub async fn upload_document(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart).await?;

    let file_type = FileType::from_filename(&upload.filename)
        .ok_or_else(|| ApiError::UnsupportedFileType(upload.filename.clone()))?;
    if upload.data.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    if upload.data.len() > state.max_upload_bytes {
        return Err(ApiError::FileTooLarge {
            size: upload.data.len(),
            max: state.max_upload_bytes,
        });
    }

    let user_dir = state.upload_dir.join(user_id.to_string());
    tokio::fs::create_dir_all(&user_dir)
        .await
        .map_err(papyrus_core::Error::from)?;
    let storage_path = user_dir.join(format!("{}.{}", new_v7(), file_type));
    tokio::fs::write(&storage_path, &upload.data)
        .await
        .map_err(papyrus_core::Error::from)?;

    let file = state
        .repos
        .documents
        .insert(NewDocumentFile {
            user_id,
            filename: upload.filename,
            mime_type: upload.mime_type,
            size_bytes: upload.data.len() as i64,
            storage_path: storage_path.to_string_lossy().to_string(),
        })
        .await?;

    info!(
        subsystem = "api",
        file_id = %file.id,
        user_id = %user_id,
        %file_type,
        size_bytes = file.size_bytes,
        "Document uploaded"
    );
    Ok((StatusCode::CREATED, ApiResponse::ok(DocumentView::from(file))).into_response())
}

/// GET /api/v1/documents
pub async fn list_documents(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<Vec<DocumentView>>>, ApiError> {
    let files = state.repos.documents.list(user_id).await?;
    Ok(ApiResponse::ok(
        files.into_iter().map(DocumentView::from).collect(),
    ))
}
