//! Task repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use papyrus_core::{
    clamp_progress, new_v7, CancelOutcome, Error, ListTasksRequest, NewTask, Result, Task,
    TaskPage, TaskRepository, TaskStatus, TaskStatusUpdate, TaskType,
};

const TASK_COLUMNS: &str = "task_id, task_type, user_id, file_id, status, progress, job_id, \
                            result, error_message, created_at, updated_at, started_at, completed_at";

const TERMINAL_STATUSES: &str = "('completed', 'failed', 'cancelled')";

/// PostgreSQL implementation of TaskRepository.
pub struct PgTaskRepository {
    pool: Pool<Postgres>,
}

impl PgTaskRepository {
    /// Create a new PgTaskRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a task row into a Task struct.
    fn parse_task_row(row: PgRow) -> Result<Task> {
        let task_type: String = row.get("task_type");
        let status: String = row.get("status");
        Ok(Task {
            task_id: row.get("task_id"),
            task_type: task_type.parse::<TaskType>().map_err(Error::Internal)?,
            user_id: row.get("user_id"),
            file_id: row.get("file_id"),
            status: status.parse::<TaskStatus>().map_err(Error::Internal)?,
            progress: row.get("progress"),
            job_id: row.get("job_id"),
            result: row.get("result"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn create(&self, req: NewTask) -> Result<Task> {
        let task_id = new_v7();
        let now = Utc::now();
        let result = req.options.map(|options| json!({ "options": options }));

        let row = sqlx::query(&format!(
            "INSERT INTO task (task_id, task_type, user_id, file_id, status, progress, result,
                               created_at, updated_at)
             VALUES ($1, $2, $3, $4, 'pending', 0, $5, $6, $6)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(task_id)
        .bind(req.task_type.as_str())
        .bind(req.user_id)
        .bind(req.file_id)
        .bind(&result)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "tasks",
            op = "create",
            task_id = %task_id,
            task_type = %req.task_type,
            "Task record created"
        );
        Self::parse_task_row(row)
    }

    async fn get(&self, task_id: Uuid, user_id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM task WHERE task_id = $1 AND user_id = $2"
        ))
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_task_row).transpose()
    }

    async fn get_unscoped(&self, task_id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM task WHERE task_id = $1"))
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_task_row).transpose()
    }

    async fn update_status(
        &self,
        task_id: Uuid,
        update: TaskStatusUpdate,
    ) -> Result<Option<Task>> {
        let status = update.status.map(|s| s.as_str());
        let progress = update.progress.map(clamp_progress);

        // Terminal rows are left as they are; the current row is returned instead.
        let row = sqlx::query(&format!(
            "UPDATE task SET
                 status = COALESCE($2::text, status),
                 progress = COALESCE($3, progress),
                 result = CASE
                     WHEN $4::jsonb IS NULL THEN result
                     WHEN jsonb_typeof(result) = 'object' AND jsonb_typeof($4::jsonb) = 'object'
                         THEN result || $4::jsonb
                     ELSE $4::jsonb
                 END,
                 error_message = COALESCE($5, error_message),
                 job_id = COALESCE($6, job_id),
                 started_at = CASE
                     WHEN $2::text = 'processing' AND started_at IS NULL THEN $7
                     ELSE started_at
                 END,
                 completed_at = CASE
                     WHEN $2::text IN {TERMINAL_STATUSES} THEN $7
                     ELSE completed_at
                 END,
                 updated_at = $7
             WHERE task_id = $1 AND status NOT IN {TERMINAL_STATUSES}
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(task_id)
        .bind(status)
        .bind(progress)
        .bind(&update.result)
        .bind(&update.error_message)
        .bind(&update.job_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => Self::parse_task_row(row).map(Some),
            None => self.get_unscoped(task_id).await,
        }
    }

    async fn list(&self, user_id: Uuid, req: ListTasksRequest) -> Result<TaskPage> {
        let req = req.normalized();
        let status = req.status.map(|s| s.as_str());
        let task_type = req.task_type.map(|t| t.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM task
             WHERE user_id = $1
               AND ($2::text IS NULL OR status = $2)
               AND ($3::text IS NULL OR task_type = $3)",
        )
        .bind(user_id)
        .bind(status)
        .bind(task_type)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM task
             WHERE user_id = $1
               AND ($2::text IS NULL OR status = $2)
               AND ($3::text IS NULL OR task_type = $3)
             ORDER BY created_at DESC, task_id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(user_id)
        .bind(status)
        .bind(task_type)
        .bind(req.page_size)
        .bind(req.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let items = rows
            .into_iter()
            .map(Self::parse_task_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(TaskPage::new(items, total, req.page, req.page_size))
    }

    async fn cancel(&self, task_id: Uuid, user_id: Uuid) -> Result<CancelOutcome> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "UPDATE task
             SET status = 'cancelled', completed_at = $3, updated_at = $3
             WHERE task_id = $1 AND user_id = $2 AND status NOT IN {TERMINAL_STATUSES}
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(task_id)
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = row {
            return Ok(CancelOutcome::Cancelled(Self::parse_task_row(row)?));
        }

        match self.get(task_id, user_id).await? {
            Some(task) => Ok(CancelOutcome::AlreadyFinished(task.status)),
            None => Ok(CancelOutcome::NotFound),
        }
    }

    async fn latest_for_file(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        task_type: TaskType,
    ) -> Result<Option<Task>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM task
             WHERE file_id = $1 AND user_id = $2 AND task_type = $3
             ORDER BY created_at DESC, task_id DESC
             LIMIT 1"
        ))
        .bind(file_id)
        .bind(user_id)
        .bind(task_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_task_row).transpose()
    }

    async fn existing_extraction(&self, file_id: Uuid, user_id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM task
             WHERE file_id = $1 AND user_id = $2
               AND task_type = 'extract' AND status = 'completed'
             ORDER BY created_at DESC, task_id DESC
             LIMIT 1"
        ))
        .bind(file_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_task_row).transpose()
    }
}
