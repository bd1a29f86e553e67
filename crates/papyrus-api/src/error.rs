//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use papyrus_core::{Error, TaskStatus};
use papyrus_jobs::{error_message, SubmitError, EXTRACTION_REQUIRED_MESSAGE};

/// Error returned by route handlers.
///
/// Rendered as `{"success": false, "error": <message>, "code": <CODE>}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Task is already {0} and cannot be cancelled")]
    TaskAlreadyCompleted(TaskStatus),

    #[error("File not found: {0}")]
    FileNotFound(Uuid),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File is {size} bytes, the limit is {max}")]
    FileTooLarge { size: usize, max: usize },

    #[error("Please extract the document text first")]
    ExtractionRequired,

    #[error("Document {0} has not been extracted yet")]
    ExtractionNotFound(Uuid),

    #[error("{message}")]
    TaskExecutionFailed { task_id: Uuid, message: String },

    #[error("{0}")]
    ApiKeyRequired(String),

    #[error("{message}")]
    OperationFailed { code: &'static str, message: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Internal(Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<Uuid>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TaskNotFound(_) | Self::FileNotFound(_) | Self::ExtractionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::TaskAlreadyCompleted(_)
            | Self::UnsupportedFileType(_)
            | Self::ExtractionRequired
            | Self::ApiKeyRequired(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::TaskExecutionFailed { .. } | Self::OperationFailed { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::TaskAlreadyCompleted(_) => "TASK_ALREADY_COMPLETED",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::UnsupportedFileType(_) => "UNSUPPORTED_FILE_TYPE",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::ExtractionRequired => "EXTRACTION_REQUIRED",
            Self::ExtractionNotFound(_) => "EXTRACTION_NOT_FOUND",
            Self::TaskExecutionFailed { .. } => "TASK_EXECUTION_FAILED",
            Self::ApiKeyRequired(_) => "API_KEY_REQUIRED",
            Self::OperationFailed { code, .. } => code,
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Map an LLM failure from a synchronous operation onto its error code.
    pub fn operation(code: &'static str, err: Error) -> Self {
        match err {
            Error::Inference(_) | Error::Request(_) => Self::OperationFailed {
                code,
                message: error_message(&err),
            },
            other => other.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::TaskNotFound(id) => Self::TaskNotFound(id),
            Error::FileNotFound(id) => Self::FileNotFound(id),
            Error::InvalidInput(msg) if msg == EXTRACTION_REQUIRED_MESSAGE => {
                Self::ExtractionRequired
            }
            Error::InvalidInput(msg) => Self::BadRequest(msg),
            Error::Config(msg) => Self::ApiKeyRequired(msg),
            Error::Unauthorized(msg) => Self::Unauthorized(msg),
            other => Self::Internal(other),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Rejected(e) => e.into(),
            SubmitError::ExecutionFailed { task_id, source } => Self::TaskExecutionFailed {
                task_id,
                message: error_message(&source),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        if status.is_server_error() {
            error!(subsystem = "api", code, error = %self, "Request failed");
        } else {
            warn!(subsystem = "api", code, error = %self, "Request rejected");
        }

        let task_id = match &self {
            Self::TaskExecutionFailed { task_id, .. } => Some(*task_id),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            code,
            task_id,
        };
        (status, Json(body)).into_response()
    }
}
