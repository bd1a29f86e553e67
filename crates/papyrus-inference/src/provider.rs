//! Per-user generation backend resolution.
//!
//! A user's saved API key and model take precedence over the server-wide
//! DashScope configuration. When neither supplies a key, generation is
//! refused with a configuration error.

use std::sync::Arc;

use tracing::debug;

use papyrus_core::{Error, GenerationBackend, GenerationProvider, LlmSettings, Result};

use crate::openai::{OpenAIBackend, OpenAIConfig};

/// Error message returned when no API key is available for a user.
pub const MISSING_API_KEY_MESSAGE: &str = "Please configure your API key in settings first";

/// Builds OpenAI-compatible backends from server and user settings.
pub struct OpenAIProvider {
    config: OpenAIConfig,
    default_backend: Option<Arc<OpenAIBackend>>,
}

impl OpenAIProvider {
    /// Create a provider. A shared backend is built up front when the server has a key.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let default_backend = if config.api_key.is_some() {
            Some(Arc::new(OpenAIBackend::new(config.clone())?))
        } else {
            None
        };
        Ok(Self {
            config,
            default_backend,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

impl GenerationProvider for OpenAIProvider {
    fn has_default_key(&self) -> bool {
        self.default_backend.is_some()
    }

    fn backend_for(&self, settings: Option<&LlmSettings>) -> Result<Arc<dyn GenerationBackend>> {
        let user_key = settings.and_then(LlmSettings::api_key);
        let user_model = settings.and_then(LlmSettings::model_name);

        if let Some(key) = user_key {
            let mut config = self.config.clone().with_api_key(key);
            if let Some(model) = user_model {
                config = config.with_model(model);
            }
            debug!(
                subsystem = "inference",
                model = %config.gen_model,
                "Using user-supplied API key"
            );
            return Ok(Arc::new(OpenAIBackend::new(config)?));
        }

        let default_backend = self
            .default_backend
            .as_ref()
            .ok_or_else(|| Error::Config(MISSING_API_KEY_MESSAGE.to_string()))?;

        match user_model {
            Some(model) if model != self.config.gen_model => Ok(Arc::new(OpenAIBackend::new(
                self.config.clone().with_model(model),
            )?)),
            _ => Ok(default_backend.clone()),
        }
    }
}
