//! Vector storage
//!
//! [`VectorIndex`] keeps every chunk next to its embedding and answers
//! brute-force top-k queries. It is built once per ingestion run, persisted to
//! a directory as a single self-describing JSON file, and reloaded read-only
//! for queries.
//!
//! # Storage Model
//!
//! Each stored item consists of:
//! - Chunk: the original text and metadata
//! - Embedding: the vector representation
//!
//! The persisted file also records the format version, embedding model,
//! similarity metric and dimension so a reload can be validated without
//! re-embedding anything.
//!
//! # Usage
//!
//! ```ignore
//! use deskmate_lib::store::{BuildOptions, VectorIndex};
//!
//! let index = VectorIndex::build(&chunks, &mut embedder, &BuildOptions::default(), &cancel)?;
//! index.persist(Path::new("faiss_index"))?;
//!
//! let index = VectorIndex::load(Path::new("faiss_index"))?;
//! let results = index.query(&query_embedding, 4)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::chunk::Chunk;
use crate::embed::Embedding;

/// A search result with similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The matched chunk
    pub chunk: Chunk,
    /// Similarity score (higher is more similar)
    /// For cosine similarity: -1.0 to 1.0
    pub score: f32,
}

/// A stored chunk and its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Embedding,
}

/// Similarity function used to rank entries against a query
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Angle between vectors, ignores magnitude
    #[default]
    Cosine,
    /// Raw dot product, for models that emit normalized vectors
    InnerProduct,
}

impl Metric {
    /// Score `b` against `a`; higher is more similar.
    #[must_use]
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::InnerProduct => dot(a, b),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 means identical direction, and 0 when
/// either vector has zero length.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}

/// Trait for vector storage backends
pub trait VectorStore: Send + Sync {
    /// Insert chunks with their embeddings
    ///
    /// # Arguments
    /// * `chunks` - The text chunks to store
    /// * `embeddings` - Corresponding embeddings (must be same length)
    fn insert(&mut self, chunks: &[Chunk], embeddings: &[Embedding]) -> Result<()>;

    /// Search for similar chunks
    ///
    /// # Arguments
    /// * `query_embedding` - The query vector
    /// * `k` - Number of results to return
    ///
    /// # Returns
    /// Top-k results sorted by similarity (highest first)
    fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Get total number of stored chunks
    fn len(&self) -> usize;

    /// Check if store is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all stored data
    fn clear(&mut self);
}

mod index;
mod persist;

pub use index::*;
pub use persist::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 2.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_inner_product_keeps_magnitude() {
        let q = [1.0, 0.0];
        assert!(Metric::InnerProduct.score(&q, &[3.0, 0.0]) > Metric::InnerProduct.score(&q, &[1.0, 0.0]));
        assert!((Metric::Cosine.score(&q, &[3.0, 0.0]) - Metric::Cosine.score(&q, &[1.0, 0.0])).abs() < 1e-6);
    }
}
