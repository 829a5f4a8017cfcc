//! Blocking client for the Google Generative Language API.
//!
//! - `POST {base}/models/{model}:generateContent`    text generation
//! - `POST {base}/models/{model}:batchEmbedContents` embeddings
//!
//! The API key travels in the `x-goog-api-key` header so it never shows up in
//! URLs logged by [`BackendError::HttpStatus`].

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ModelSettings;
use crate::provider::{BackendError, http_client, normalize_endpoint, read_json};

pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Retrieval role of a text sent for embedding.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

/// Gemini client bound to a single model.
pub struct GeminiService {
    client: Client,
    base: String,
    /// Model resource name, always prefixed with `models/`.
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl GeminiService {
    /// Creates a client for `cfg.model`.
    ///
    /// # Errors
    /// - [`BackendError::MissingApiKey`] without `cfg.api_key`
    /// - [`BackendError::InvalidEndpoint`] if `cfg.endpoint` is set but invalid
    /// - [`BackendError::Transport`] if the HTTP client cannot be built
    pub fn new(cfg: &ModelSettings) -> Result<Self, BackendError> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(BackendError::MissingApiKey("gemini"))?;
        let base = normalize_endpoint(cfg.endpoint.as_deref().unwrap_or(GEMINI_ENDPOINT))?;

        Ok(Self {
            client: http_client(cfg.timeout_secs)?,
            base,
            model: model_resource(&cfg.model),
            api_key,
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }

    /// Model resource name, e.g. `models/gemini-1.5-pro`.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single-turn, non-streaming generation.
    ///
    /// # Errors
    /// [`BackendError::HttpStatus`] for non-2xx responses (quota, invalid
    /// model), [`BackendError::Transport`] for network failures and timeouts,
    /// [`BackendError::Empty`] when no candidate carries text.
    #[instrument(skip_all, fields(model = %self.model))]
    pub fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/{}:generateContent", self.base, self.model);
        let body = GenerateRequest {
            contents: vec![Content::user(prompt)],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        debug!("POST {url}");
        let resp = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()?;
        let out: GenerateResponse = read_json(resp, &url)?;

        let text: String = out
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BackendError::Empty(self.model.clone()));
        }
        Ok(text)
    }

    /// Embed `texts` in one request; vectors come back in input order.
    ///
    /// # Errors
    /// As [`generate`](Self::generate), plus [`BackendError::Decode`] when the
    /// number of vectors differs from the number of inputs.
    #[instrument(skip_all, fields(model = %self.model, count = texts.len()))]
    pub fn embed_batch(&self, texts: &[&str], task: TaskType) -> Result<Vec<Vec<f32>>, BackendError> {
        let url = format!("{}/{}:batchEmbedContents", self.base, self.model);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &self.model,
                    content: Content::user(text),
                    task_type: task,
                })
                .collect(),
        };

        debug!("POST {url}");
        let resp = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()?;
        let out: BatchEmbedResponse = read_json(resp, &url)?;

        if out.embeddings.len() != texts.len() {
            return Err(BackendError::Decode(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                out.embeddings.len()
            )));
        }
        Ok(out.embeddings.into_iter().map(|e| e.values).collect())
    }
}

fn model_resource(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/* ==========================
HTTP payloads
========================== */

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn user(text: &'a str) -> Self {
        Self {
            role: Some("user"),
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}
