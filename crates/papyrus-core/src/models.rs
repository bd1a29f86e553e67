//! Core data models for papyrus.
//!
//! These types are shared across all papyrus crates and represent the task
//! lifecycle, the queue, documents and the analysis results produced for them.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;

// =============================================================================
// TASK TYPES
// =============================================================================

/// Kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Extract text, sections and metadata from a document
    Extract,
    /// Summarize a previously extracted document
    Summarize,
    /// Question answering over a document
    Qa,
    /// Rewrite a passage
    Rewrite,
    /// Build a mindmap from a previously extracted document
    Mindmap,
}

impl TaskType {
    /// All task types, in declaration order.
    pub const ALL: [TaskType; 5] = [
        TaskType::Extract,
        TaskType::Summarize,
        TaskType::Qa,
        TaskType::Rewrite,
        TaskType::Mindmap,
    ];

    /// Storage / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Summarize => "summarize",
            Self::Qa => "qa",
            Self::Rewrite => "rewrite",
            Self::Mindmap => "mindmap",
        }
    }

    /// Content kind persisted when a task of this type completes.
    pub fn content_type(&self) -> Option<ContentType> {
        match self {
            Self::Extract => Some(ContentType::FileExtraction),
            Self::Summarize => Some(ContentType::FileSummary),
            Self::Mindmap => Some(ContentType::FileMindmap),
            Self::Qa | Self::Rewrite => None,
        }
    }

    /// Whether this task type runs through the background pipeline.
    pub fn is_background(&self) -> bool {
        self.content_type().is_some()
    }

    /// Whether the task needs a completed extraction before it can run.
    pub fn requires_extraction(&self) -> bool {
        matches!(self, Self::Summarize | Self::Mindmap)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "extract" | "extraction" => Ok(Self::Extract),
            "summarize" | "summary" => Ok(Self::Summarize),
            "qa" => Ok(Self::Qa),
            "rewrite" => Ok(Self::Rewrite),
            "mindmap" => Ok(Self::Mindmap),
            _ => Err(format!("Invalid task type: {}", s)),
        }
    }
}

/// Durable status of a task record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Storage / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed, failed and cancelled are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Position in the lifecycle: pending < processing < terminal.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed | Self::Cancelled => 2,
        }
    }

    /// Whether moving from `self` to `next` advances the lifecycle.
    ///
    /// Terminal states never advance.
    pub fn can_advance_to(&self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

/// A durable task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub task_type: TaskType,
    pub user_id: Uuid,
    pub file_id: Option<Uuid>,
    pub status: TaskStatus,
    pub progress: i32,
    /// Queue job id, or `sync_execution` when the task ran in-process.
    pub job_id: Option<String>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Task is currently executing.
    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Processing
    }

    /// Task reached a terminal state (completed, failed or cancelled).
    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Task completed successfully.
    pub fn is_successful(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Time between start and completion, when both are known.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Options supplied at creation, stored under `result.options`.
    pub fn options(&self) -> Option<&JsonValue> {
        self.result.as_ref().and_then(|r| r.get("options"))
    }

    /// Deserialize the creation options, falling back to defaults.
    pub fn options_as<T: DeserializeOwned + Default>(&self) -> T {
        self.options()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Queue job id, if the task was handed to a real queue.
    pub fn queue_job_id(&self) -> Option<&str> {
        self.job_id
            .as_deref()
            .filter(|id| !id.is_empty() && *id != defaults::SYNC_EXECUTION_JOB_ID)
    }
}

/// Request for creating a new task record.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: Uuid,
    pub file_id: Option<Uuid>,
    pub task_type: TaskType,
    pub options: Option<JsonValue>,
}

/// Partial update applied to a task record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStatusUpdate {
    pub status: Option<TaskStatus>,
    pub progress: Option<i32>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub job_id: Option<String>,
}

impl TaskStatusUpdate {
    /// Update that only changes the status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Update that only changes the progress.
    pub fn progress(progress: i32) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Update that only records the queue job id.
    pub fn job_id(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            ..Default::default()
        }
    }

    /// Mark the task completed with a result payload.
    pub fn completed(result: JsonValue) -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            progress: Some(100),
            result: Some(result),
            ..Default::default()
        }
    }

    /// Mark the task failed with an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            error_message: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: i32) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Progress value as stored (clamped to 0..=100).
    pub fn clamped_progress(&self) -> Option<i32> {
        self.progress.map(clamp_progress)
    }
}

/// Clamp a progress percentage to 0..=100.
pub fn clamp_progress(progress: i32) -> i32 {
    progress.clamp(0, 100)
}

/// Shallow-merge `update` into `existing`.
///
/// When both are objects, keys from `update` overwrite keys in `existing`.
/// Otherwise `update` replaces `existing`.
pub fn merge_result(existing: Option<JsonValue>, update: JsonValue) -> JsonValue {
    match (existing, update) {
        (Some(JsonValue::Object(mut base)), JsonValue::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
            JsonValue::Object(base)
        }
        (_, update) => update,
    }
}

/// Filters and paging for listing a user's tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct ListTasksRequest {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    /// 1-based page number.
    pub page: i64,
    pub page_size: i64,
}

impl Default for ListTasksRequest {
    fn default() -> Self {
        Self {
            status: None,
            task_type: None,
            page: defaults::PAGE,
            page_size: defaults::PAGE_SIZE,
        }
    }
}

impl ListTasksRequest {
    /// Clamp page to 1..=PAGE_MAX and page size to 1..=100.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.clamp(1, defaults::PAGE_MAX);
        self.page_size = self.page_size.clamp(1, defaults::PAGE_SIZE_MAX);
        self
    }

    /// Row offset for the requested page.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.page_size.max(1))
    }
}

/// One page of a user's tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    pub items: Vec<Task>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl TaskPage {
    pub fn new(items: Vec<Task>, total: i64, page: i64, page_size: i64) -> Self {
        let page_size = page_size.max(1);
        Self {
            items,
            total,
            page,
            page_size,
            total_pages: (total + page_size - 1) / page_size,
        }
    }
}

/// Outcome of a cancellation attempt.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    /// The task was moved to `cancelled`.
    Cancelled(Task),
    /// The task had already reached a terminal state.
    AlreadyFinished(TaskStatus),
    /// No such task for this user.
    NotFound,
}

// =============================================================================
// QUEUE TYPES
// =============================================================================

/// Transient status of a job on the background queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueJobStatus {
    Queued,
    Started,
    Finished,
    Failed,
    Canceled,
}

impl QueueJobStatus {
    pub const ALL: [QueueJobStatus; 5] = [
        QueueJobStatus::Queued,
        QueueJobStatus::Started,
        QueueJobStatus::Finished,
        QueueJobStatus::Failed,
        QueueJobStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Durable task status corresponding to this queue status.
    pub fn to_task_status(&self) -> TaskStatus {
        match self {
            Self::Queued => TaskStatus::Pending,
            Self::Started => TaskStatus::Processing,
            Self::Finished => TaskStatus::Completed,
            Self::Failed => TaskStatus::Failed,
            Self::Canceled => TaskStatus::Cancelled,
        }
    }

    /// Finished, failed and canceled jobs will not change again.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for QueueJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueueJobStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" | "deferred" | "scheduled" => Ok(Self::Queued),
            "started" => Ok(Self::Started),
            "finished" => Ok(Self::Finished),
            "failed" | "stopped" => Ok(Self::Failed),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(format!("Invalid queue job status: {}", s)),
        }
    }
}

/// How tasks are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    /// Tasks are handed to the Redis-backed queue.
    Redis,
    /// No queue; tasks run in-process.
    Memory,
}

impl QueueMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for QueueMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work placed on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: String,
    pub task_id: Uuid,
    pub task_type: TaskType,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedJob {
    /// Create a job for a task with a fresh job id.
    pub fn for_task(task: &Task) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            task_id: task.task_id,
            task_type: task.task_type,
            enqueued_at: Utc::now(),
        }
    }
}

/// Queue counters for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Jobs waiting to be picked up.
    pub size: i64,
    pub started: i64,
    pub finished: i64,
    pub failed: i64,
    pub canceled: i64,
}

/// Redis connection status and configuration summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisStatus {
    pub enabled: bool,
    pub connected: bool,
    pub mode: QueueMode,
    pub host: String,
    pub port: u16,
    pub db: i64,
}

/// How a submitted task is being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    /// Handed off to the background queue.
    Queued,
    /// Executed in-process during submission.
    Synchronous,
}

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }

    /// Detect the format from a file extension (case-insensitive, leading dot optional).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" | "md" => Some(Self::Txt),
            _ => None,
        }
    }

    /// Detect the format from a filename.
    pub fn from_filename(filename: &str) -> Option<Self> {
        std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded document owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    /// Lower-cased extension without the dot.
    pub file_type: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentFile {
    /// Recognized format, if supported.
    pub fn kind(&self) -> Option<FileType> {
        FileType::from_extension(&self.file_type)
    }
}

/// Request for registering an uploaded document.
#[derive(Debug, Clone)]
pub struct NewDocumentFile {
    pub user_id: Uuid,
    pub filename: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub storage_path: String,
}

/// Kind of generated content stored for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    FileExtraction,
    FileSummary,
    FileMindmap,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileExtraction => "file_extraction",
            Self::FileSummary => "file_summary",
            Self::FileMindmap => "file_mindmap",
        }
    }

    /// Task type that produces this content.
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::FileExtraction => TaskType::Extract,
            Self::FileSummary => TaskType::Summarize,
            Self::FileMindmap => TaskType::Mindmap,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file_extraction" | "extraction" => Ok(Self::FileExtraction),
            "file_summary" | "summary" => Ok(Self::FileSummary),
            "file_mindmap" | "mindmap" => Ok(Self::FileMindmap),
            _ => Err(format!("Invalid content type: {}", s)),
        }
    }
}

/// Generated content persisted for a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub file_id: Uuid,
    pub content_type: ContentType,
    pub content: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// EXTRACTION TYPES
// =============================================================================

/// Options accepted by extraction tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    pub include_metadata: bool,
    pub split_sections: bool,
    /// Ask the LLM to classify key sentences (requires an API key).
    pub key_sentences: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            split_sections: true,
            key_sentences: false,
        }
    }
}

/// A titled section of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub content: String,
    pub word_count: usize,
}

/// Statistics describing an extracted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub file_size: u64,
    pub word_count: usize,
    pub char_count: usize,
    pub page_count: usize,
    /// `zh` or `en`.
    pub language: String,
    pub file_type: String,
}

/// Output of an extraction task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub extracted_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_sentences: Option<JsonValue>,
}

// =============================================================================
// ANALYSIS TYPES
// =============================================================================

/// Summary flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryType {
    #[default]
    Brief,
    Detailed,
    Custom,
}

/// Options accepted by summarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    pub summary_type: SummaryType,
    pub max_length: usize,
    pub focus_areas: Vec<String>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            summary_type: SummaryType::Brief,
            max_length: defaults::SUMMARY_MAX_LENGTH,
            focus_areas: Vec::new(),
        }
    }
}

/// Length comparison between the source text and its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub original_length: usize,
    pub summary_length: usize,
    pub compression_ratio: f64,
    pub original_words: usize,
    pub summary_words: usize,
}

impl SummaryStatistics {
    /// Compute statistics for a source text and its summary (character based).
    pub fn compute(original: &str, summary: &str) -> Self {
        let original_length = original.chars().count();
        let summary_length = summary.chars().count();
        let compression_ratio = if original_length == 0 {
            0.0
        } else {
            let ratio = summary_length as f64 / original_length as f64;
            (ratio * 10_000.0).round() / 10_000.0
        };
        Self {
            original_length,
            summary_length,
            compression_ratio,
            original_words: original.split_whitespace().count(),
            summary_words: summary.split_whitespace().count(),
        }
    }
}

/// Output of summarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    pub key_points: Vec<String>,
    pub statistics: SummaryStatistics,
}

/// A previous message in a question-answering conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn is_user(&self) -> bool {
        self.role.eq_ignore_ascii_case("user")
    }
}

/// Passage of the document an answer relies on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaSource {
    pub section: String,
    pub excerpt: String,
}

/// Answer produced by question answering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    pub confidence: f64,
    pub sources: Vec<QaSource>,
    pub suggested_questions: Vec<String>,
}

/// Target style for a rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteType {
    #[default]
    Academic,
    Casual,
    Formal,
    Creative,
    Concise,
}

/// Target length for a rewrite relative to the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteLength {
    Shorter,
    #[default]
    Same,
    Longer,
}

/// Output language for generated text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLanguage {
    Zh,
    #[default]
    En,
}

/// Options accepted by rewriting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteOptions {
    pub rewrite_type: RewriteType,
    pub length: RewriteLength,
    pub tone: Option<String>,
    pub language: OutputLanguage,
}

/// Output of rewriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteResult {
    pub rewritten_text: String,
    pub improvements: Vec<String>,
}

/// Options accepted by mindmap generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MindmapOptions {
    pub max_depth: u32,
    pub include_keywords: bool,
}

impl Default for MindmapOptions {
    fn default() -> Self {
        Self {
            max_depth: defaults::MINDMAP_MAX_DEPTH,
            include_keywords: true,
        }
    }
}

impl MindmapOptions {
    /// Requested depth limited to 1..=5.
    pub fn depth(&self) -> u32 {
        self.max_depth.clamp(1, defaults::MINDMAP_DEPTH_LIMIT)
    }
}

/// A node of a mindmap tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindmapNode {
    pub name: String,
    #[serde(default)]
    pub children: Vec<MindmapNode>,
}

impl MindmapNode {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Tree used when the model output cannot be parsed.
    pub fn fallback() -> Self {
        Self::leaf("Document")
    }

    /// Number of nodes below this one.
    pub fn count_branches(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.count_branches())
            .sum()
    }

    /// Depth of the deepest descendant (a lone node has depth 0).
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.depth())
            .max()
            .unwrap_or(0)
    }

    /// Drop nodes deeper than `max_depth` levels below this one.
    pub fn truncate_depth(&mut self, max_depth: usize) {
        if max_depth == 0 {
            self.children.clear();
            return;
        }
        for child in &mut self.children {
            child.truncate_depth(max_depth - 1);
        }
    }
}

/// Shape summary of a mindmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindmapStructure {
    pub total_branches: usize,
    pub max_depth: usize,
    pub main_topics: Vec<String>,
}

impl MindmapStructure {
    pub fn of(root: &MindmapNode) -> Self {
        Self {
            total_branches: root.count_branches(),
            max_depth: root.depth(),
            main_topics: root.children.iter().map(|c| c.name.clone()).collect(),
        }
    }
}

/// Output of mindmap generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindmapResult {
    pub mindmap: MindmapNode,
    pub keywords: Vec<String>,
    pub structure: MindmapStructure,
}

// =============================================================================
// USER SETTINGS
// =============================================================================

/// Per-user LLM credentials and model preference.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model_name: Option<String>,
}

impl LlmSettings {
    /// API key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Model override, ignoring blank values.
    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref().filter(|m| !m.trim().is_empty())
    }
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model_name", &self.model_name)
            .finish()
    }
}
