//! Runtime configuration.
//!
//! Settings are built once at startup by merging, lowest priority first:
//! compiled defaults, `deskmate.toml` (or an explicit file), then
//! `DESKMATE_*` environment variables with `__` separating nested keys
//! (`DESKMATE_CHUNKING__OVERLAP=100`). `GOOGLE_API_KEY` fills any Gemini
//! key left unset. The resulting [`Settings`] is passed by reference into
//! backend constructors and the pipeline; nothing reads the environment later.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::chunk::RecursiveChunker;
use crate::pipeline::DocumentJoin;
use crate::store::Metric;
use crate::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "deskmate.toml";
pub const ENV_PREFIX: &str = "DESKMATE_";
pub const GOOGLE_API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Top-level settings for ingestion and querying.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum characters per chunk.
    pub max_size: usize,
    /// Characters shared by consecutive chunks; must be below `max_size`.
    pub overlap: usize,
    /// Whether uploaded documents are chunked as one text or one by one.
    pub join: DocumentJoin,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_size: 1000,
            overlap: 200,
            join: DocumentJoin::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory holding the persisted index.
    pub location: PathBuf,
    pub metric: Metric,
    /// Chunks embedded per backend call during ingestion.
    pub batch_size: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            location: PathBuf::from("faiss_index"),
            metric: Metric::default(),
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks handed to the generation backend.
    pub k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { k: 4 }
    }
}

/// Hosted generation providers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Ollama,
}

/// Embedding providers: hosted ones plus the local BGE model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// BAAI/bge-*-en-v1.5 through fastembed, runs locally. `model` must
    /// name one of them.
    Bge,
    #[default]
    Gemini,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model: String,
    /// Overrides the provider's default base URL.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Expected vector dimension for hosted models.
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Gemini,
            model: "models/embedding-001".to_string(),
            endpoint: None,
            api_key: None,
            dimension: 768,
            timeout_secs: 60,
        }
    }
}

impl EmbeddingSettings {
    /// Connection settings for a hosted embedding model.
    #[must_use]
    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            provider: match self.provider {
                EmbeddingProvider::Ollama => Provider::Ollama,
                EmbeddingProvider::Bge | EmbeddingProvider::Gemini => Provider::Gemini,
            },
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            temperature: 0.0,
            max_tokens: None,
            timeout_secs: self.timeout_secs,
        }
    }
}

/// One generation model: provider, model name and sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: Provider,
    pub model: String,
    /// Overrides the provider's default base URL.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl ModelSettings {
    /// Gemini model with the default temperature of 0.3.
    pub fn gemini(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: "gemini-1.5-pro".to_string(),
            endpoint: None,
            api_key: None,
            temperature: 0.3,
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    pub primary: ModelSettings,
    /// Tried once when the primary model fails.
    pub fallback: ModelSettings,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            primary: ModelSettings::gemini("gemini-1.5-pro"),
            fallback: ModelSettings::gemini("gemini-1.0-pro"),
        }
    }
}

impl Settings {
    /// Load settings from defaults, a TOML file and the environment.
    ///
    /// `path` names an explicit config file, which must exist. Without it
    /// `deskmate.toml` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) if !p.exists() => {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut settings: Settings = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        settings.fill_api_keys(std::env::var(GOOGLE_API_KEY_VAR).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Extract and validate settings from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Use `key` for every Gemini backend that has no key of its own.
    pub fn fill_api_keys(&mut self, key: Option<String>) {
        let Some(key) = key.filter(|k| !k.trim().is_empty()) else {
            return;
        };

        if self.embedding.provider == EmbeddingProvider::Gemini && self.embedding.api_key.is_none() {
            self.embedding.api_key = Some(key.clone());
        }
        for model in [&mut self.generation.primary, &mut self.generation.fallback] {
            if model.provider == Provider::Gemini && model.api_key.is_none() {
                model.api_key = Some(key.clone());
            }
        }
    }

    /// Reject settings that would fail later at ingestion or query time.
    pub fn validate(&self) -> Result<()> {
        RecursiveChunker::new(self.chunking.max_size, self.chunking.overlap)?;

        if self.retrieval.k == 0 {
            return Err(Error::Config("retrieval.k must be at least 1".to_string()));
        }
        if self.index.batch_size == 0 {
            return Err(Error::Config("index.batch_size must be at least 1".to_string()));
        }
        if self.index.location.as_os_str().is_empty() {
            return Err(Error::Config("index.location must not be empty".to_string()));
        }

        if self.embedding.model.trim().is_empty() {
            return Err(Error::Config("embedding.model must not be empty".to_string()));
        }
        validate_endpoint("embedding.endpoint", self.embedding.endpoint.as_deref())?;

        for (name, model) in [
            ("generation.primary", &self.generation.primary),
            ("generation.fallback", &self.generation.fallback),
        ] {
            if model.model.trim().is_empty() {
                return Err(Error::Config(format!("{name}.model must not be empty")));
            }
            if !(model.temperature.is_finite() && (0.0..=2.0).contains(&model.temperature)) {
                return Err(Error::Config(format!(
                    "{name}.temperature must be within 0.0..=2.0"
                )));
            }
            validate_endpoint(name, model.endpoint.as_deref())?;
        }

        Ok(())
    }
}

fn validate_endpoint(field: &str, endpoint: Option<&str>) -> Result<()> {
    match endpoint {
        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => Err(
            Error::Config(format!("{field} must start with http:// or https://")),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_toml(toml: &str) -> Figment {
        Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml))
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();

        assert_eq!(settings.chunking.max_size, 1000);
        assert_eq!(settings.retrieval.k, 4);
        assert_eq!(settings.index.location, PathBuf::from("faiss_index"));
        assert_eq!(settings.generation.primary.model, "gemini-1.5-pro");
        assert_eq!(settings.generation.fallback.model, "gemini-1.0-pro");
        assert!((settings.generation.primary.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_toml_overrides_nested_values() {
        let settings = Settings::from_figment(with_toml(
            r#"
            [chunking]
            overlap = 100

            [index]
            location = "data/index"
            metric = "inner_product"

            [generation.fallback]
            provider = "ollama"
            model = "llama3"
            endpoint = "http://localhost:11434"
            "#,
        ))
        .unwrap();

        assert_eq!(settings.chunking.overlap, 100);
        assert_eq!(settings.chunking.max_size, 1000);
        assert_eq!(settings.index.location, PathBuf::from("data/index"));
        assert_eq!(settings.index.metric, Metric::InnerProduct);
        assert_eq!(settings.generation.fallback.provider, Provider::Ollama);
        assert_eq!(settings.generation.primary.provider, Provider::Gemini);
    }

    #[test]
    fn test_overlap_equal_to_size_is_rejected() {
        let result = Settings::from_figment(with_toml(
            "[chunking]\nmax_size = 1000\noverlap = 1000\n",
        ));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_k_is_rejected() {
        let result = Settings::from_figment(with_toml("[retrieval]\nk = 0\n"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_temperature_is_rejected() {
        let mut settings = Settings::default();
        settings.generation.primary.temperature = 3.5;
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_endpoint_is_rejected() {
        let mut settings = Settings::default();
        settings.embedding.endpoint = Some("localhost:11434".to_string());
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_api_key_fills_only_gemini_backends() {
        let mut settings = Settings::default();
        settings.generation.fallback.provider = Provider::Ollama;
        settings.generation.primary.api_key = Some("own-key".to_string());

        settings.fill_api_keys(Some("shared-key".to_string()));

        assert_eq!(settings.embedding.api_key.as_deref(), Some("shared-key"));
        assert_eq!(settings.generation.primary.api_key.as_deref(), Some("own-key"));
        assert_eq!(settings.generation.fallback.api_key, None);
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let result = Settings::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
