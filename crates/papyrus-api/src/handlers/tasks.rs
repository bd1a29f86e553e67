//! Task status, listing and cancellation.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;
use uuid::Uuid;

use papyrus_core::defaults::{PAGE, PAGE_MAX, PAGE_SIZE, PAGE_SIZE_MAX};
use papyrus_core::{CancelOutcome, ListTasksRequest, Task, TaskStatus, TaskType};

use crate::{ApiError, ApiResponse, AppState, CurrentUser};

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status: Option<String>,
    pub task_type: Option<String>,
}

impl ListTasksQuery {
    fn into_request(self) -> Result<ListTasksRequest, ApiError> {
        let page = self.page.unwrap_or(PAGE);
        if !(1..=PAGE_MAX).contains(&page) {
            return Err(ApiError::BadRequest(format!(
                "page must be between 1 and {}",
                PAGE_MAX
            )));
        }
        let page_size = self.page_size.unwrap_or(PAGE_SIZE);
        if !(1..=PAGE_SIZE_MAX).contains(&page_size) {
            return Err(ApiError::BadRequest(format!(
                "page_size must be between 1 and {}",
                PAGE_SIZE_MAX
            )));
        }

        let status = self
            .status
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<TaskStatus>())
            .transpose()
            .map_err(ApiError::BadRequest)?;
        let task_type = self
            .task_type
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<TaskType>())
            .transpose()
            .map_err(ApiError::BadRequest)?;

        Ok(ListTasksRequest {
            status,
            task_type,
            page,
            page_size,
        })
    }
}

/// Row in the task list; results are only returned by the detail route.
#[derive(Debug, Serialize)]
pub struct TaskListItem {
    pub task_id: Uuid,
    pub file_id: Option<Uuid>,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub progress: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Task> for TaskListItem {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.task_id,
            file_id: task.file_id,
            task_type: task.task_type,
            status: task.status,
            progress: task.progress,
            created_at: task.created_at,
            updated_at: task.updated_at,
            completed_at: task.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListView {
    pub items: Vec<TaskListItem>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// GET /api/v1/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<ApiResponse<TaskListView>>, ApiError> {
    let request = query.into_request()?;
    let page = state.repos.tasks.list(user_id, request).await?;

    Ok(ApiResponse::ok(TaskListView {
        items: page.items.into_iter().map(TaskListItem::from).collect(),
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages,
    }))
}

/// Detailed task status after reconciliation with the queue.
#[derive(Debug, Serialize)]
pub struct TaskStatusView {
    pub task_id: Uuid,
    pub file_id: Option<Uuid>,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub progress: i32,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Task> for TaskStatusView {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.task_id,
            file_id: task.file_id,
            task_type: task.task_type,
            status: task.status,
            progress: task.progress,
            result: task.result,
            error_message: task.error_message,
            created_at: task.created_at,
            updated_at: task.updated_at,
            completed_at: task.completed_at,
        }
    }
}

/// GET /api/v1/tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<ApiResponse<TaskStatusView>>, ApiError> {
    let task = state
        .reconciler
        .reconcile(task_id, user_id)
        .await?
        .ok_or(ApiError::TaskNotFound(task_id))?;
    Ok(ApiResponse::ok(task.into()))
}

#[derive(Debug, Serialize)]
pub struct CancelledTask {
    pub task_id: Uuid,
    pub status: TaskStatus,
}

/// POST /api/v1/tasks/:id/cancel
pub async fn cancel_task(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CancelledTask>>, ApiError> {
    match state.submitter.cancel(task_id, user_id).await? {
        CancelOutcome::Cancelled(task) => {
            info!(
                subsystem = "api",
                task_id = %task_id,
                user_id = %user_id,
                "Task cancelled"
            );
            Ok(ApiResponse::ok(CancelledTask {
                task_id: task.task_id,
                status: task.status,
            }))
        }
        CancelOutcome::AlreadyFinished(status) => Err(ApiError::TaskAlreadyCompleted(status)),
        CancelOutcome::NotFound => Err(ApiError::TaskNotFound(task_id)),
    }
}
