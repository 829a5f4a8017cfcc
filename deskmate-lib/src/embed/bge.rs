use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::embed::{Embedder, Embedding};
use crate::{Error, Result};

/// Prefix BGE models expect on retrieval queries (but not on passages).
const QUERY_PREFIX: &str = "Represent this sentence for searching relevant passages: ";

/// Local BGE embedder running on ONNX through fastembed.
///
/// No API key or network access is needed once the model is cached. Model
/// names follow the Hugging Face ids:
///
/// | model                    | dims |
/// |--------------------------|------|
/// | `BAAI/bge-small-en-v1.5` | 384  |
/// | `BAAI/bge-base-en-v1.5`  | 768  |
/// | `BAAI/bge-large-en-v1.5` | 1024 |
pub struct BgeEmbedder {
    model: TextEmbedding,
    name: &'static str,
    dimension: usize,
}

impl BgeEmbedder {
    /// Load one of the BGE English v1.5 models by name, downloading it on
    /// first use (~1.2GB for the large model).
    ///
    /// # Errors
    /// [`Error::Config`] for an unknown model name, [`Error::Embedding`] if the
    /// model cannot be downloaded or initialised.
    pub fn with_model(name: &str) -> Result<Self> {
        let (model, name, dimension) = match name.trim() {
            "BAAI/bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, "BAAI/bge-small-en-v1.5", 384),
            "BAAI/bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, "BAAI/bge-base-en-v1.5", 768),
            "BAAI/bge-large-en-v1.5" => (EmbeddingModel::BGELargeENV15, "BAAI/bge-large-en-v1.5", 1024),
            other => {
                return Err(Error::Config(format!(
                    "unknown local embedding model: {other} (expected BAAI/bge-small-en-v1.5, \
                     BAAI/bge-base-en-v1.5 or BAAI/bge-large-en-v1.5)"
                )));
            }
        };

        let opts = InitOptions::new(model).with_show_download_progress(true);
        TextEmbedding::try_new(opts)
            .map(|model| Self {
                model,
                name,
                dimension,
            })
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

impl Embedder for BgeEmbedder {
    fn model_name(&self) -> &str {
        self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.model
            .embed(texts, None)
            .map_err(|e| Error::Embedding(e.to_string()))
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        self.model
            .embed(vec![format!("{QUERY_PREFIX}{text}")], None)
            .map_err(|e| Error::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))
    }
}
