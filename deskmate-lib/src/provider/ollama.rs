//! Blocking client for a local Ollama runtime.
//!
//! - `POST {endpoint}/api/generate` text generation (`stream=false`)
//! - `POST {endpoint}/api/embed`    batched embeddings

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ModelSettings;
use crate::provider::{BackendError, http_client, normalize_endpoint, read_json};

pub const OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Ollama client bound to a single model.
pub struct OllamaService {
    client: Client,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    url_generate: String,
    url_embed: String,
}

impl OllamaService {
    /// Creates a client for `cfg.model`.
    ///
    /// # Errors
    /// - [`BackendError::InvalidEndpoint`] if the endpoint is invalid
    /// - [`BackendError::Transport`] if the HTTP client cannot be built
    pub fn new(cfg: &ModelSettings) -> Result<Self, BackendError> {
        let base = normalize_endpoint(cfg.endpoint.as_deref().unwrap_or(OLLAMA_ENDPOINT))?;

        Ok(Self {
            client: http_client(cfg.timeout_secs)?,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            url_generate: format!("{base}/api/generate"),
            url_embed: format!("{base}/api/embed"),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Performs a **non-streaming** generation request via `/api/generate`.
    ///
    /// # Errors
    /// - [`BackendError::HttpStatus`] for non-2xx responses
    /// - [`BackendError::Transport`] for client errors
    /// - [`BackendError::Decode`] if response cannot be parsed
    #[instrument(skip_all, fields(model = %self.model))]
    pub fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        debug!("POST {}", self.url_generate);
        let resp = self.client.post(&self.url_generate).json(&body).send()?;
        let out: GenerateResponse = read_json(resp, &self.url_generate)?;

        if out.response.trim().is_empty() {
            return Err(BackendError::Empty(self.model.clone()));
        }
        Ok(out.response)
    }

    /// Retrieves embeddings for `texts` via `/api/embed`.
    ///
    /// # Errors
    /// As [`generate`](Self::generate), plus [`BackendError::Decode`] when the
    /// number of vectors differs from the number of inputs.
    #[instrument(skip_all, fields(model = %self.model, count = texts.len()))]
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, BackendError> {
        let body = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        debug!("POST {}", self.url_embed);
        let resp = self.client.post(&self.url_embed).json(&body).send()?;
        let out: EmbedResponse = read_json(resp, &self.url_embed)?;

        if out.embeddings.len() != texts.len() {
            return Err(BackendError::Decode(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                out.embeddings.len()
            )));
        }
        Ok(out.embeddings)
    }
}

/* ==========================
HTTP payloads & options
========================== */

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// Subset of Ollama `options`.
#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Minimal shape: the generated text is in `response`.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}
