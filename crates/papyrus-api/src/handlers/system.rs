//! Health and queue status.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use papyrus_core::{QueueStats, RedisStatus};

use crate::{ApiError, ApiResponse, AppState};

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "queue_mode": state.submitter.queue_mode(),
    }))
}

#[derive(Debug, Serialize)]
pub struct QueueStatusView {
    pub available: bool,
    pub redis: RedisStatus,
    pub stats: QueueStats,
}

/// GET /api/v1/queue/status
pub async fn queue_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<QueueStatusView>>, ApiError> {
    let submitter = &state.submitter;
    Ok(ApiResponse::ok(QueueStatusView {
        available: submitter.is_queue_available().await,
        redis: submitter.redis_status().await,
        stats: submitter.queue_stats().await?,
    }))
}
