//! In-memory repository implementations.
//!
//! These mirror the PostgreSQL repositories closely enough to drive the task
//! lifecycle in tests and in local development without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use papyrus_core::{
    clamp_progress, merge_result, new_v7, CancelOutcome, ContentRepository, ContentType,
    DocumentContent, DocumentFile, DocumentRepository, ListTasksRequest, LlmSettings, NewDocumentFile,
    NewTask, Repositories, Result, Task, TaskPage, TaskRepository, TaskStatus, TaskStatusUpdate,
    TaskType, UserSettingsRepository,
};

use crate::documents::extension_of;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// TASKS
// =============================================================================

/// In-memory task store.
#[derive(Default)]
pub struct MemoryTaskRepository {
    tasks: Mutex<HashMap<Uuid, Task>>,
}

impl MemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks.
    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn newest_matching(&self, predicate: impl Fn(&Task) -> bool) -> Option<Task> {
        lock(&self.tasks)
            .values()
            .filter(|t| predicate(t))
            .max_by_key(|t| (t.created_at, t.task_id))
            .cloned()
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn create(&self, req: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            task_id: new_v7(),
            task_type: req.task_type,
            user_id: req.user_id,
            file_id: req.file_id,
            status: TaskStatus::Pending,
            progress: 0,
            job_id: None,
            result: req.options.map(|options| json!({ "options": options })),
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        lock(&self.tasks).insert(task.task_id, task.clone());
        Ok(task)
    }

    async fn get(&self, task_id: Uuid, user_id: Uuid) -> Result<Option<Task>> {
        Ok(lock(&self.tasks)
            .get(&task_id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn get_unscoped(&self, task_id: Uuid) -> Result<Option<Task>> {
        Ok(lock(&self.tasks).get(&task_id).cloned())
    }

    async fn update_status(
        &self,
        task_id: Uuid,
        update: TaskStatusUpdate,
    ) -> Result<Option<Task>> {
        let mut tasks = lock(&self.tasks);
        let Some(task) = tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        if task.status.is_terminal() {
            return Ok(Some(task.clone()));
        }

        let now = Utc::now();
        if let Some(status) = update.status {
            task.status = status;
            if status == TaskStatus::Processing && task.started_at.is_none() {
                task.started_at = Some(now);
            }
            if status.is_terminal() {
                task.completed_at = Some(now);
            }
        }
        if let Some(progress) = update.progress {
            task.progress = clamp_progress(progress);
        }
        if let Some(result) = update.result {
            task.result = Some(merge_result(task.result.take(), result));
        }
        if let Some(error) = update.error_message {
            task.error_message = Some(error);
        }
        if let Some(job_id) = update.job_id {
            task.job_id = Some(job_id);
        }
        task.updated_at = now;
        Ok(Some(task.clone()))
    }

    async fn list(&self, user_id: Uuid, req: ListTasksRequest) -> Result<TaskPage> {
        let req = req.normalized();
        let mut matching: Vec<Task> = lock(&self.tasks)
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| req.status.map_or(true, |s| t.status == s))
            .filter(|t| req.task_type.map_or(true, |ty| t.task_type == ty))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.task_id.cmp(&a.task_id))
        });

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(req.offset() as usize)
            .take(req.page_size as usize)
            .collect();
        Ok(TaskPage::new(items, total, req.page, req.page_size))
    }

    async fn cancel(&self, task_id: Uuid, user_id: Uuid) -> Result<CancelOutcome> {
        let mut tasks = lock(&self.tasks);
        let Some(task) = tasks.get_mut(&task_id).filter(|t| t.user_id == user_id) else {
            return Ok(CancelOutcome::NotFound);
        };
        if task.status.is_terminal() {
            return Ok(CancelOutcome::AlreadyFinished(task.status));
        }
        let now = Utc::now();
        task.status = TaskStatus::Cancelled;
        task.completed_at = Some(now);
        task.updated_at = now;
        Ok(CancelOutcome::Cancelled(task.clone()))
    }

    async fn latest_for_file(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        task_type: TaskType,
    ) -> Result<Option<Task>> {
        Ok(self.newest_matching(|t| {
            t.file_id == Some(file_id) && t.user_id == user_id && t.task_type == task_type
        }))
    }

    async fn existing_extraction(&self, file_id: Uuid, user_id: Uuid) -> Result<Option<Task>> {
        Ok(self.newest_matching(|t| {
            t.file_id == Some(file_id)
                && t.user_id == user_id
                && t.task_type == TaskType::Extract
                && t.status == TaskStatus::Completed
        }))
    }
}

// =============================================================================
// DOCUMENTS AND CONTENT
// =============================================================================

/// In-memory document store.
#[derive(Default)]
pub struct MemoryDocumentRepository {
    files: Mutex<HashMap<Uuid, DocumentFile>>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn insert(&self, req: NewDocumentFile) -> Result<DocumentFile> {
        let file = DocumentFile {
            id: new_v7(),
            user_id: req.user_id,
            file_type: extension_of(&req.filename),
            filename: req.filename,
            mime_type: req.mime_type,
            size_bytes: req.size_bytes,
            storage_path: req.storage_path,
            created_at: Utc::now(),
        };
        lock(&self.files).insert(file.id, file.clone());
        Ok(file)
    }

    async fn get(&self, file_id: Uuid, user_id: Uuid) -> Result<Option<DocumentFile>> {
        Ok(lock(&self.files)
            .get(&file_id)
            .filter(|f| f.user_id == user_id)
            .cloned())
    }

    async fn get_unscoped(&self, file_id: Uuid) -> Result<Option<DocumentFile>> {
        Ok(lock(&self.files).get(&file_id).cloned())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<DocumentFile>> {
        let mut files: Vec<DocumentFile> = lock(&self.files)
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(files)
    }
}

/// In-memory generated-content store.
#[derive(Default)]
pub struct MemoryContentRepository {
    contents: Mutex<HashMap<(Uuid, ContentType), DocumentContent>>,
}

impl MemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentRepository for MemoryContentRepository {
    async fn upsert(
        &self,
        file_id: Uuid,
        content_type: ContentType,
        content: JsonValue,
    ) -> Result<DocumentContent> {
        let now = Utc::now();
        let mut contents = lock(&self.contents);
        let entry = contents
            .entry((file_id, content_type))
            .and_modify(|c| {
                c.content = content.clone();
                c.updated_at = now;
            })
            .or_insert_with(|| DocumentContent {
                file_id,
                content_type,
                content: content.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(entry.clone())
    }

    async fn get(
        &self,
        file_id: Uuid,
        content_type: ContentType,
    ) -> Result<Option<DocumentContent>> {
        Ok(lock(&self.contents).get(&(file_id, content_type)).cloned())
    }
}

/// In-memory per-user settings store.
#[derive(Default)]
pub struct MemoryUserSettingsRepository {
    settings: Mutex<HashMap<Uuid, LlmSettings>>,
}

impl MemoryUserSettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserSettingsRepository for MemoryUserSettingsRepository {
    async fn get_llm_settings(&self, user_id: Uuid) -> Result<Option<LlmSettings>> {
        Ok(lock(&self.settings).get(&user_id).cloned())
    }

    async fn set_llm_settings(&self, user_id: Uuid, settings: LlmSettings) -> Result<()> {
        lock(&self.settings).insert(user_id, settings);
        Ok(())
    }
}

// =============================================================================
// DATABASE
// =============================================================================

/// In-memory counterpart of [`crate::Database`].
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    pub tasks: Arc<MemoryTaskRepository>,
    pub documents: Arc<MemoryDocumentRepository>,
    pub contents: Arc<MemoryContentRepository>,
    pub user_settings: Arc<MemoryUserSettingsRepository>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trait-object handles to every repository.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            tasks: self.tasks.clone(),
            documents: self.documents.clone(),
            contents: self.contents.clone(),
            user_settings: self.user_settings.clone(),
        }
    }
}
