//! OpenAI-compatible generation backend.
//!
//! DashScope exposes an OpenAI-compatible mode, which is the default
//! endpoint. Any other OpenAI-compatible server works as well (OpenAI,
//! vLLM, LocalAI, Ollama in compatibility mode).
//!
//! # Example
//!
//! ```rust,no_run
//! use papyrus_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use papyrus_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         api_key: Some("sk-...".to_string()),
//!         ..OpenAIConfig::from_env()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!     let reply = backend.generate("Hello").await.unwrap();
//!     println!("{reply}");
//! }
//! ```

mod backend;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
pub use types::*;
