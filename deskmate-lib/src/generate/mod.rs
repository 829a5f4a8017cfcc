//! Text generation backends
//!
//! A [`GenerationBackend`] turns a finished prompt into text. The answer
//! orchestrator holds two of them, a primary and a fallback.

use crate::config::{ModelSettings, Provider};
use crate::provider::{BackendError, GeminiService, OllamaService};
use crate::{Error, Result};

/// Trait for text generation models
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for `prompt`.
    fn generate(&mut self, prompt: &str) -> std::result::Result<String, BackendError>;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

impl<T: GenerationBackend + ?Sized> GenerationBackend for Box<T> {
    fn generate(&mut self, prompt: &str) -> std::result::Result<String, BackendError> {
        (**self).generate(prompt)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

impl GenerationBackend for GeminiService {
    fn generate(&mut self, prompt: &str) -> std::result::Result<String, BackendError> {
        GeminiService::generate(self, prompt)
    }

    fn model_name(&self) -> &str {
        self.model()
    }
}

impl GenerationBackend for OllamaService {
    fn generate(&mut self, prompt: &str) -> std::result::Result<String, BackendError> {
        OllamaService::generate(self, prompt)
    }

    fn model_name(&self) -> &str {
        self.model()
    }
}

/// Build the generation backend described by `settings`.
///
/// # Errors
/// [`Error::Config`] when the client cannot be configured, e.g. a Gemini
/// model without an API key.
pub fn from_settings(settings: &ModelSettings) -> Result<Box<dyn GenerationBackend>> {
    let config_error =
        |e: BackendError| Error::Config(format!("generation model {}: {e}", settings.model));

    let backend: Box<dyn GenerationBackend> = match settings.provider {
        Provider::Gemini => Box::new(GeminiService::new(settings).map_err(config_error)?),
        Provider::Ollama => Box::new(OllamaService::new(settings).map_err(config_error)?),
    };
    Ok(backend)
}
