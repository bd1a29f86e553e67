//! # papyrus-inference
//!
//! LLM generation for papyrus.
//!
//! This crate provides:
//! - An OpenAI-compatible generation backend (DashScope by default)
//! - Per-user backend resolution from saved API keys
//! - Prompt templates and lenient JSON parsing of model replies
//! - [`DocumentAnalyzer`] for summaries, QA, rewriting, mindmaps and key sentences
//!
//! # Feature Flags
//!
//! - `mock`: Enable [`mock::MockGenerationBackend`] and [`mock::MockProvider`] outside tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use papyrus_inference::{DocumentAnalyzer, OpenAIProvider, SummaryOptions};
//! use papyrus_core::GenerationProvider;
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = OpenAIProvider::from_env().unwrap();
//!     let analyzer = DocumentAnalyzer::new(provider.backend_for(None).unwrap());
//!     let summary = analyzer
//!         .summarize("Paper text...", &SummaryOptions::default())
//!         .await
//!         .unwrap();
//!     println!("{}", summary.summary);
//! }
//! ```

pub mod analyzer;
pub mod json;
pub mod openai;
pub mod prompts;
pub mod provider;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use papyrus_core::*;

pub use analyzer::DocumentAnalyzer;
pub use json::{extract_json_object, parse_json_as};
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use provider::{OpenAIProvider, MISSING_API_KEY_MESSAGE};
