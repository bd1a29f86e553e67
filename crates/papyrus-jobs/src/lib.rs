//! # papyrus-jobs
//!
//! Task lifecycle for the papyrus reading assistant.
//!
//! This crate provides:
//! - Document text extraction with section and metadata detection
//! - Task handlers for extraction, summaries and mind maps
//! - A Redis-backed job queue with an in-memory stand-in
//! - Submission with synchronous fallback when the queue is unavailable
//! - A concurrent queue worker with per-task timeouts
//! - Reconciliation of stored task state against the queue
//!
//! ## Example
//!
//! ```ignore
//! use papyrus_jobs::{build_queue, JobWorker, RedisConfig, TaskExecutor, WorkerConfig};
//!
//! let config = RedisConfig::from_env();
//! let queue = build_queue(&config).await;
//! let executor = Arc::new(TaskExecutor::with_default_handlers(repos, provider, registry));
//!
//! if let Some(queue) = queue.clone() {
//!     let handle = JobWorker::new(queue, executor.clone(), WorkerConfig::from_env()).start();
//!     let mut events = handle.events();
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//!     handle.shutdown().await?;
//! }
//! ```

pub mod adapters;
pub mod executor;
pub mod extraction;
pub mod handler;
pub mod handlers;
pub mod metadata;
pub mod queue;
pub mod reconcile;
pub mod sections;
pub mod submission;
pub mod worker;

// Re-export core types
pub use papyrus_core::*;

pub use adapters::{OfficeConvertAdapter, PdfTextAdapter, TextNativeAdapter};
pub use executor::{error_message, TaskExecutor, TASK_CANCELLED_MESSAGE};
pub use extraction::ExtractionRegistry;
pub use handler::{JobContext, TaskHandler};
pub use handlers::{
    ExtractHandler, MindmapHandler, SummarizeHandler, EXTRACTION_REQUIRED_MESSAGE,
};
pub use queue::{build_queue, JobQueue, MemoryJobQueue, RedisConfig, RedisJobQueue};
pub use reconcile::{ContentCheck, StatusReconciler, DEFAULT_JOB_FAILURE};
pub use submission::{SubmitError, SubmittedTask, TaskSubmitter};
pub use worker::{JobWorker, WorkerConfig, WorkerEvent, WorkerHandle};
