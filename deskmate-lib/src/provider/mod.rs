//! HTTP clients for hosted model providers
//!
//! Thin blocking clients shared by the embedding and generation backends:
//! - [`GeminiService`]: Google Generative Language REST API
//! - [`OllamaService`]: local Ollama runtime
//!
//! Both are built from a [`ModelSettings`](crate::config::ModelSettings) and
//! report failures as [`BackendError`].

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Errors produced by a model provider call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Endpoint is empty or not an http(s) URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The provider requires an API key and none was configured.
    #[error("missing API key for {0}")]
    MissingApiKey(&'static str),

    /// Transport/HTTP client error (timeouts, DNS, TLS).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-successful HTTP status from upstream.
    #[error("unexpected HTTP status {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        /// First characters of the response body.
        snippet: String,
    },

    /// Unexpected/invalid JSON response.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The provider answered but produced no usable output.
    #[error("empty response from {0}")]
    Empty(String),

    /// Backend refused the call for any other reason.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Longest response body excerpt kept in [`BackendError::HttpStatus`].
const SNIPPET_CHARS: usize = 240;

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client, BackendError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

pub(crate) fn normalize_endpoint(endpoint: &str) -> Result<String, BackendError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty()
        || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
    {
        return Err(BackendError::InvalidEndpoint(endpoint.to_string()));
    }
    Ok(endpoint.trim_end_matches('/').to_string())
}

/// Check the status of `resp` and decode its JSON body.
pub(crate) fn read_json<T: DeserializeOwned>(resp: Response, url: &str) -> Result<T, BackendError> {
    let status = resp.status();
    debug!(%status, url, "provider response");

    if !status.is_success() {
        let text = resp.text().unwrap_or_default();
        return Err(BackendError::HttpStatus {
            status,
            url: url.to_string(),
            snippet: text.chars().take(SNIPPET_CHARS).collect(),
        });
    }

    resp.json::<T>()
        .map_err(|e| BackendError::Decode(format!("{url}: {e}")))
}

mod gemini;
mod ollama;

pub use gemini::*;
pub use ollama::*;
