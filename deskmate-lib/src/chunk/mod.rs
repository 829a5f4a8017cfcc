//! Document chunking
//!
//! Text is split into overlapping windows of at most `max_size` characters.
//! Window ends snap back to the nearest paragraph, line, sentence or word
//! boundary so chunks rarely cut a word in half.
//!
//! # Usage
//!
//! ```ignore
//! use deskmate_lib::chunk::{split, Chunker, ChunkMetadata, RecursiveChunker};
//!
//! // One-off split
//! let chunks = split(&text, 1000, 200)?;
//!
//! // Reusable chunker that tags chunks with their source document
//! let chunker = RecursiveChunker::new(1000, 200)?;
//! let chunks = chunker.chunk(&text, ChunkMetadata::for_source("report.txt"));
//! ```

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::Result;

/// A chunk of text with its metadata
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Chunk {
    /// Content hash, stable for identical text
    pub id: String,
    /// The text content of this chunk
    pub content: String,
    /// Metadata about the source and position
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a chunk from raw content, deriving its id from the text.
    pub fn new(content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        let content = content.into();
        Self {
            id: generate_id(&content),
            content,
            metadata,
        }
    }
}

/// Metadata associated with a chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ChunkMetadata {
    /// Source document name, when chunks are kept per document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Byte offset of the chunk within the source text
    pub position: usize,
    /// Total number of chunks from this source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
}

impl ChunkMetadata {
    /// Metadata for chunks of a named source document.
    pub fn for_source(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            ..Self::default()
        }
    }
}

/// Trait for document chunking strategies
pub trait Chunker: Send + Sync {
    /// Split content into chunks
    ///
    /// # Arguments
    /// * `content` - The text content to chunk
    /// * `metadata` - Base metadata to attach to each chunk
    ///
    /// # Returns
    /// Chunks in document order, each with position metadata
    fn chunk(&self, content: &str, metadata: ChunkMetadata) -> Vec<Chunk>;

    /// Returns the name of this chunking strategy
    fn name(&self) -> &str;
}

/// Split `text` into overlapping chunks of at most `max_size` characters.
///
/// Consecutive chunks share exactly `overlap` characters.
///
/// # Errors
/// [`Error::Config`](crate::Error::Config) if `max_size` is zero or
/// `overlap >= max_size`.
pub fn split(text: &str, max_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let chunker = RecursiveChunker::new(max_size, overlap)?;
    Ok(chunker.chunk(text, ChunkMetadata::default()))
}

pub(crate) fn generate_id(string: &str) -> String {
    let mut hasher = DefaultHasher::new();
    string.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

mod recursive;

pub use recursive::*;
