//! Structured logging field names for papyrus.
//!
//! All crates use these constants for consistent structured logging fields
//! so that log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), task completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (sections, queue polls) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → task → sub-calls.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "jobs", "queue"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "worker", "submitter", "reconciler", "redis_queue"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "submit", "execute", "reconcile", "enqueue"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Task UUID being operated on.
pub const TASK_ID: &str = "task_id";

/// Task type (extract, summarize, ...).
pub const TASK_TYPE: &str = "task_type";

/// Queue job id.
pub const JOB_ID: &str = "job_id";

/// Document file UUID.
pub const FILE_ID: &str = "file_id";

/// Owning user UUID.
pub const USER_ID: &str = "user_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Inference / queue fields ──────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Queue mode ("redis" or "memory").
pub const QUEUE_MODE: &str = "queue_mode";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
