use crate::config::EmbeddingSettings;
use crate::embed::{Embedder, Embedding};
use crate::provider::{BackendError, GeminiService, OllamaService, TaskType};
use crate::{Error, Result};

fn embedding_error(e: BackendError) -> Error {
    Error::Embedding(e.to_string())
}

/// Embedder backed by Google's hosted embedding models.
///
/// Documents and queries are sent with different task types so the model can
/// place them asymmetrically, the same way BGE uses a query prefix.
pub struct GeminiEmbedder {
    service: GeminiService,
    dimension: usize,
}

impl GeminiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let service = GeminiService::new(&settings.model_settings()).map_err(embedding_error)?;
        Ok(Self {
            service,
            dimension: settings.dimension,
        })
    }
}

impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        self.service.model()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.service
            .embed_batch(texts, TaskType::RetrievalDocument)
            .map_err(embedding_error)
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        self.service
            .embed_batch(&[text], TaskType::RetrievalQuery)
            .map_err(embedding_error)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))
    }
}

/// Embedder backed by an Ollama embedding model (e.g. `nomic-embed-text`).
pub struct OllamaEmbedder {
    service: OllamaService,
    dimension: usize,
}

impl OllamaEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let service = OllamaService::new(&settings.model_settings()).map_err(embedding_error)?;
        Ok(Self {
            service,
            dimension: settings.dimension,
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        self.service.model()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.service.embed_batch(texts).map_err(embedding_error)
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        self.service
            .embed_batch(&[text])
            .map_err(embedding_error)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))
    }
}
