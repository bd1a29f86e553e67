//! OpenAI-compatible generation backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use papyrus_core::{defaults, Error, GenerationBackend, Result};

use super::types::*;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion token budget.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// How the endpoint rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    /// Missing, invalid or unauthorized key.
    Credentials,
    UnknownModel,
    /// DashScope content inspection blocked the prompt or the reply.
    ContentBlocked,
    Throttled,
    Upstream,
    Other,
}

impl Rejection {
    /// DashScope reports its specific code in `code`, OpenAI in `type`.
    fn classify(status: u16, error: &OpenAIError) -> Self {
        let tagged = |tag: &str| error.error_type == tag || error.code.as_deref() == Some(tag);
        match status {
            401 | 403 => Self::Credentials,
            _ if tagged("invalid_api_key") => Self::Credentials,
            _ if tagged("data_inspection_failed") => Self::ContentBlocked,
            404 => Self::UnknownModel,
            _ if tagged("model_not_found") => Self::UnknownModel,
            429 => Self::Throttled,
            500..=599 => Self::Upstream,
            _ => Self::Other,
        }
    }

    fn is_transient(self) -> bool {
        matches!(self, Self::Throttled | Self::Upstream)
    }

    /// Key and model problems are the caller's to fix, so they map to `Config`.
    fn into_error(self, message: &str) -> Error {
        match self {
            Self::Credentials => Error::Config(format!("Authentication failed: {}", message)),
            Self::UnknownModel => Error::Config(format!("Model not found: {}", message)),
            Self::ContentBlocked => {
                Error::Inference(format!("Content rejected by inspection: {}", message))
            }
            Self::Throttled => Error::Inference(format!("Rate limit exceeded: {}", message)),
            Self::Upstream => Error::Inference(format!("Server error: {}", message)),
            Self::Other => Error::Inference(message.to_string()),
        }
    }
}

/// Configuration for OpenAI-compatible backend.
#[derive(Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication.
    pub api_key: Option<String>,
    /// Model to use for generation.
    pub gen_model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("gen_model", &self.gen_model)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::DASHSCOPE_URL.to_string(),
            api_key: None,
            gen_model: defaults::GEN_MODEL.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }
}

impl OpenAIConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DASHSCOPE_BASE_URL` | DashScope compatible-mode endpoint |
    /// | `DASHSCOPE_API_KEY` | unset |
    /// | `DASHSCOPE_MODEL` | `qwen-max` |
    /// | `LLM_TIMEOUT` | `120` |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("DASHSCOPE_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("DASHSCOPE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            gen_model: std::env::var("DASHSCOPE_MODEL")
                .ok()
                .filter(|model| !model.trim().is_empty())
                .unwrap_or(defaults.gen_model),
            timeout_seconds: std::env::var("LLM_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_seconds),
            ..defaults
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.gen_model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// OpenAI-compatible generation backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            subsystem = "inference",
            base_url = %config.base_url,
            model = %config.gen_model,
            "Initializing generation backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        let start = std::time::Instant::now();
        debug!(
            subsystem = "inference",
            op = "generate",
            model = %self.config.gen_model,
            prompt_len = prompt.len(),
            "Generating"
        );

        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: OpenAIErrorResponse = response
                .json()
                .await
                .unwrap_or_else(|_| OpenAIErrorResponse::unknown());
            let rejection = Rejection::classify(status.as_u16(), &body.error);
            warn!(
                subsystem = "inference",
                op = "generate",
                status = status.as_u16(),
                ?rejection,
                transient = rejection.is_transient(),
                error = %body.error.message,
                "Generation request rejected"
            );
            return Err(rejection.into_error(&body.error.message));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(Error::Inference("Model returned an empty response".to_string()));
        }

        info!(
            subsystem = "inference",
            op = "generate",
            model = %self.config.gen_model,
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}
