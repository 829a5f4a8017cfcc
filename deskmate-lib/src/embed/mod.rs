//! Text embedding
//!
//! Every backend implements [`Embedder`]. Three are provided:
//! - [`BgeEmbedder`]: BAAI/bge-large-en-v1.5 via fastembed, runs locally
//! - [`GeminiEmbedder`]: Google `embedding-001`
//! - [`OllamaEmbedder`]: any embedding model served by Ollama
//!
//! # Usage
//!
//! ```ignore
//! use deskmate_lib::embed::{self, Embedder};
//!
//! let mut embedder = embed::from_settings(&settings.embedding)?;
//!
//! // Embed documents (for indexing)
//! let doc_embeddings = embedder.embed_documents(&["Quarterly report...", "Meeting notes..."])?;
//!
//! // Embed query (for searching)
//! let query_embedding = embedder.embed_query("When is the next review?")?;
//! ```

use crate::Result;
use crate::config::{EmbeddingProvider, EmbeddingSettings};

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for text embedding models
pub trait Embedder: Send + Sync {
    /// Embed multiple documents for indexing
    ///
    /// Documents may be batched for efficiency. Returns one vector per input,
    /// in input order.
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Embed a single query for searching
    ///
    /// Note: Some models (like BGE) use different prompts for queries vs documents.
    /// This method handles that distinction.
    fn embed_query(&mut self, text: &str) -> Result<Embedding>;

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        (**self).embed_documents(texts)
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        (**self).embed_query(text)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Build the embedder selected in `settings`.
///
/// # Errors
/// - [`Error::Config`](crate::Error::Config) if `provider = "bge"` names a
///   model other than the BGE English v1.5 family
/// - [`Error::Embedding`](crate::Error::Embedding) if the model cannot be
///   loaded or the client cannot be configured (for example a missing API key)
pub fn from_settings(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let embedder: Box<dyn Embedder> = match settings.provider {
        EmbeddingProvider::Bge => Box::new(BgeEmbedder::with_model(&settings.model)?),
        EmbeddingProvider::Gemini => Box::new(GeminiEmbedder::new(settings)?),
        EmbeddingProvider::Ollama => Box::new(OllamaEmbedder::new(settings)?),
    };
    Ok(embedder)
}

mod bge;
mod remote;

pub use bge::*;
pub use remote::*;
