//! Centralized default constants for papyrus.
//!
//! Shared default values live here so that the API, the worker and the
//! inference layer agree on limits. Organized by domain area.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page number for task listings (1-based).
pub const PAGE: i64 = 1;

/// Default page size for task listings.
pub const PAGE_SIZE: i64 = 20;

/// Maximum accepted page size for task listings.
pub const PAGE_SIZE_MAX: i64 = 100;

/// Highest page number accepted by task listings.
pub const PAGE_MAX: i64 = 1_000_000;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8000;

/// Default request body limit (50 MiB).
pub const MAX_BODY_SIZE_BYTES: usize = 50 * 1024 * 1024;

/// Directory uploaded documents are written to.
pub const UPLOAD_DIR: &str = "uploads";

/// Longest accepted per-user API key.
pub const API_KEY_MAX_CHARS: usize = 256;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;

/// Header carrying the authenticated user id, set by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

// =============================================================================
// TASK QUEUE
// =============================================================================

/// Name of the background queue.
pub const QUEUE_NAME: &str = "tasks";

/// Key prefix for queue data in Redis.
pub const QUEUE_KEY_PREFIX: &str = "papyrus";

/// `job_id` recorded on a task that ran in-process instead of on the queue.
pub const SYNC_EXECUTION_JOB_ID: &str = "sync_execution";

/// Seconds a finished or failed job's metadata is retained in the queue.
pub const JOB_RESULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Default Redis host.
pub const REDIS_HOST: &str = "localhost";

/// Default Redis port.
pub const REDIS_PORT: u16 = 6379;

/// Default Redis logical database.
pub const REDIS_DB: i64 = 0;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default worker poll interval in milliseconds when the queue is empty.
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum concurrent tasks per worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Task execution timeout in seconds (10 minutes).
pub const JOB_TIMEOUT_SECS: u64 = 600;

/// Worker event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Progress recorded when a task starts processing.
pub const PROGRESS_STARTED: i32 = 10;

/// Progress recorded once the document text is available.
pub const PROGRESS_TEXT_READY: i32 = 40;

/// Progress recorded when the LLM call returns.
pub const PROGRESS_GENERATED: i32 = 80;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Per-command timeout for external extraction tools (seconds).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Target words per section when a document has no recognizable headers.
pub const SECTION_TARGET_WORDS: usize = 500;

/// Words per page used to estimate the page count of non-paginated files.
pub const WORDS_PER_PAGE: usize = 300;

/// Share of CJK characters above which a document is classified as Chinese.
pub const CJK_LANGUAGE_THRESHOLD: f64 = 0.3;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default DashScope OpenAI-compatible endpoint.
pub const DASHSCOPE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Default generation model.
pub const GEN_MODEL: &str = "qwen-max";

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Maximum characters of document text sent for summarization.
pub const SUMMARY_INPUT_CHARS: usize = 8000;

/// Maximum characters of document text sent for question answering.
pub const QA_CONTEXT_CHARS: usize = 6000;

/// Maximum characters of document text sent for mindmap and key-sentence prompts.
pub const MINDMAP_INPUT_CHARS: usize = 6000;

/// Number of previous QA turns included as conversation history.
pub const QA_HISTORY_TURNS: usize = 5;

/// Default summary length budget (characters).
pub const SUMMARY_MAX_LENGTH: usize = 500;

/// Default mindmap depth.
pub const MINDMAP_MAX_DEPTH: u32 = 3;

/// Upper bound for the requested mindmap depth.
pub const MINDMAP_DEPTH_LIMIT: u32 = 5;

/// Confidence reported when the model omits one.
pub const QA_DEFAULT_CONFIDENCE: f64 = 0.5;
