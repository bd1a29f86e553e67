//! Mock generation backend for deterministic testing.
//!
//! ## Usage
//!
//! ```rust
//! use papyrus_inference::mock::MockGenerationBackend;
//! use papyrus_core::GenerationBackend;
//!
//! #[tokio::test]
//! async fn test_with_mock_backend() {
//!     let backend = MockGenerationBackend::new()
//!         .with_fixed_response(r#"{"summary": "short"}"#);
//!
//!     let reply = backend.generate("Summarize this").await.unwrap();
//!     assert!(reply.contains("short"));
//! }
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use papyrus_core::{Error, GenerationBackend, GenerationProvider, LlmSettings, Result};

use crate::provider::MISSING_API_KEY_MESSAGE;

/// Mock generation backend for testing.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    model: String,
    response_mappings: Vec<(String, String)>,
    default_response: String,
    latency_ms: u64,
    failure_rate: f64,
    failure_message: String,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
    pub timestamp: std::time::Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            model: "mock-model".to_string(),
            response_mappings: Vec::new(),
            default_response: "Mock response".to_string(),
            latency_ms: 0,
            failure_rate: 0.0,
            failure_message: "Simulated failure for testing".to_string(),
        }
    }
}

impl MockGenerationBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set a fixed response for generation requests.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Answer prompts containing `needle` with `output`. First match wins.
    pub fn with_response_mapping(
        mut self,
        needle: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .response_mappings
            .push((needle.into(), output.into()));
        self
    }

    /// Set the reported model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model = model.into();
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Always fail with an inference error carrying `message`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        let config = Arc::make_mut(&mut self.config);
        config.failure_rate = 1.0;
        config.failure_message = message.into();
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.lock_calls().clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.lock_calls().clear()
    }

    /// Get number of generation calls.
    pub fn generate_call_count(&self) -> usize {
        self.lock_calls().len()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<MockCall>> {
        self.call_log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn log_call(&self, system: &str, prompt: &str) {
        self.lock_calls().push(MockCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
            timestamp: std::time::Instant::now(),
        });
    }

    fn should_fail(&self) -> bool {
        use rand::Rng;
        if self.config.failure_rate >= 1.0 {
            true
        } else if self.config.failure_rate > 0.0 {
            rand::thread_rng().gen::<f64>() < self.config.failure_rate
        } else {
            false
        }
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.log_call(system, prompt);
        self.simulate_latency().await;

        if self.should_fail() {
            return Err(Error::Inference(self.config.failure_message.clone()));
        }

        let response = self
            .config
            .response_mappings
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()) || system.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| self.config.default_response.clone());
        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Provider handing out a shared [`MockGenerationBackend`].
#[derive(Clone)]
pub struct MockProvider {
    backend: MockGenerationBackend,
    has_default_key: bool,
}

impl MockProvider {
    /// Provider with a server-wide key configured.
    pub fn new(backend: MockGenerationBackend) -> Self {
        Self {
            backend,
            has_default_key: true,
        }
    }

    /// Provider that only works when the user supplies a key.
    pub fn without_default_key(backend: MockGenerationBackend) -> Self {
        Self {
            backend,
            has_default_key: false,
        }
    }

    pub fn backend(&self) -> &MockGenerationBackend {
        &self.backend
    }
}

impl GenerationProvider for MockProvider {
    fn has_default_key(&self) -> bool {
        self.has_default_key
    }

    fn backend_for(&self, settings: Option<&LlmSettings>) -> Result<Arc<dyn GenerationBackend>> {
        let user_key = settings.and_then(LlmSettings::api_key).is_some();
        if !user_key && !self.has_default_key {
            return Err(Error::Config(MISSING_API_KEY_MESSAGE.to_string()));
        }
        Ok(Arc::new(self.backend.clone()))
    }
}
