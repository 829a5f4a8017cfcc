//! Ingestion and question answering
//!
//! Ties chunker, embedder, vector index and answer orchestrator together.
//!
//! ```text
//! ingest: documents -> text -> chunks -> vectors -> persist(location)
//! ask:    question -> load(location) -> query vector -> top-k chunks -> prompt -> answer
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use deskmate_lib::pipeline::{Document, DynPipeline, PlainTextExtractor};
//!
//! let mut pipeline = DynPipeline::from_settings(&settings)?;
//! let doc = Document::from_path(Path::new("handbook.txt"), &PlainTextExtractor)?;
//! pipeline.ingest(&[doc])?;
//!
//! let answer = pipeline.ask("How many vacation days do I get?")?;
//! println!("{}", answer.text);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::answer::{Answer, Orchestrator};
use crate::chunk::{Chunk, ChunkMetadata, Chunker, RecursiveChunker};
use crate::config::Settings;
use crate::embed::{self, Embedder};
use crate::generate::{self, GenerationBackend};
use crate::store::{BuildOptions, SearchResult, VectorIndex, VectorStore};
use crate::{Error, Result};

/// Separator placed between documents when they are chunked as one text.
const DOCUMENT_SEPARATOR: &str = "\n\n";

/// How uploaded documents are fed to the chunker
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentJoin {
    /// All documents form one text, in upload order. A chunk may span the
    /// end of one document and the start of the next.
    #[default]
    Concatenate,
    /// Each document is chunked on its own and chunks carry the document
    /// name as `source_id`.
    Separate,
}

/// Extracted text of one uploaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Read `path` through `extractor`, naming the document after the file.
    pub fn from_path(path: &Path, extractor: &dyn TextExtractor) -> Result<Self> {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(name, extractor.extract_text(path)?))
    }
}

/// Turns a document file into plain text
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Reads UTF-8 text files as they are
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .map_err(|e| Error::InvalidInput(format!("cannot read {}: {e}", path.display())))
    }
}

/// Outcome of a successful ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub location: PathBuf,
}

/// Pipeline built from boxed backends chosen at runtime.
pub type DynPipeline =
    Pipeline<Box<dyn Embedder>, Box<dyn GenerationBackend>, Box<dyn GenerationBackend>>;

/// End-to-end ingestion and query pipeline.
pub struct Pipeline<E: Embedder, P: GenerationBackend, F: GenerationBackend> {
    embedder: E,
    orchestrator: Orchestrator<P, F>,
    chunker: RecursiveChunker,
    join: DocumentJoin,
    build: BuildOptions,
    location: PathBuf,
    k: usize,
    cancel: CancellationToken,
}

impl DynPipeline {
    /// Build the embedder and both generation backends from `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = embed::from_settings(&settings.embedding)?;
        let primary = generate::from_settings(&settings.generation.primary)?;
        let fallback = generate::from_settings(&settings.generation.fallback)?;
        Self::new(embedder, primary, fallback, settings)
    }
}

impl<E: Embedder, P: GenerationBackend, F: GenerationBackend> Pipeline<E, P, F> {
    /// Create a pipeline over explicit backends.
    ///
    /// # Errors
    /// [`Error::Config`] if `settings` are invalid.
    pub fn new(embedder: E, primary: P, fallback: F, settings: &Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            embedder,
            orchestrator: Orchestrator::new(primary, fallback),
            chunker: RecursiveChunker::new(settings.chunking.max_size, settings.chunking.overlap)?,
            join: settings.chunking.join,
            build: BuildOptions {
                metric: settings.index.metric,
                batch_size: settings.index.batch_size,
            },
            location: settings.index.location.clone(),
            k: settings.retrieval.k,
            cancel: CancellationToken::new(),
        })
    }

    /// Use `cancel` to interrupt future ingestion runs.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Split documents into chunks according to the join policy.
    #[must_use]
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        match self.join {
            DocumentJoin::Concatenate => {
                let text = documents
                    .iter()
                    .map(|d| d.text.as_str())
                    .collect::<Vec<_>>()
                    .join(DOCUMENT_SEPARATOR);
                self.chunker.chunk(&text, ChunkMetadata::default())
            }
            DocumentJoin::Separate => documents
                .iter()
                .flat_map(|d| self.chunker.chunk(&d.text, ChunkMetadata::for_source(&d.name)))
                .collect(),
        }
    }

    /// Rebuild the index from `documents` and persist it, replacing any
    /// previous index at the configured location.
    ///
    /// Nothing is written unless every chunk was embedded.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] if there is no document or no text
    /// - [`Error::Embedding`] or [`Error::Cancelled`] from the build
    /// - [`Error::Storage`] if the index cannot be written
    pub fn ingest(&mut self, documents: &[Document]) -> Result<IngestReport> {
        if documents.is_empty() {
            return Err(Error::InvalidInput("no documents to ingest".to_string()));
        }

        let chunks = self.chunk_documents(documents);
        if chunks.is_empty() || documents.iter().all(|d| d.text.trim().is_empty()) {
            return Err(Error::InvalidInput(
                "documents contain no extractable text".to_string(),
            ));
        }

        let index = VectorIndex::build(&chunks, &mut self.embedder, &self.build, &self.cancel)?;
        index.persist(&self.location)?;

        let report = IngestReport {
            documents: documents.len(),
            chunks: index.len(),
            dimension: index.dimension(),
            location: self.location.clone(),
        };
        info!(
            documents = report.documents,
            chunks = report.chunks,
            location = %report.location.display(),
            "ingestion complete"
        );
        Ok(report)
    }

    /// Top-k chunks for `question` from the persisted index.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] for an empty question
    /// - [`Error::IndexNotFound`] if ingestion never ran
    /// - [`Error::IndexCorrupt`] if the index does not match the embedder
    /// - [`Error::Embedding`] if the question cannot be embedded
    pub fn retrieve(&mut self, question: &str) -> Result<Vec<SearchResult>> {
        if question.trim().is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }

        let index = VectorIndex::load(&self.location)?;
        if index.model() != self.embedder.model_name() {
            warn!(
                index_model = index.model(),
                embedder_model = self.embedder.model_name(),
                "index was built with a different embedding model"
            );
        }

        let query = self.embedder.embed_query(question)?;
        if !index.is_empty() && query.len() != index.dimension() {
            return Err(Error::IndexCorrupt(format!(
                "index holds {}-dimensional vectors but the embedder produced {}; re-run ingestion",
                index.dimension(),
                query.len()
            )));
        }

        index.query(&query, self.k)
    }

    /// Answer `question` from the persisted index.
    ///
    /// # Errors
    /// Any error of [`retrieve`](Self::retrieve), or
    /// [`Error::Generation`] if both generation backends fail.
    pub fn ask(&mut self, question: &str) -> Result<Answer> {
        let context: Vec<Chunk> = self
            .retrieve(question)?
            .into_iter()
            .map(|r| r.chunk)
            .collect();
        self.orchestrator.answer(question, &context)
    }

    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// The embedder actually in use, which names the loaded model.
    #[must_use]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator<P, F> {
        &self.orchestrator
    }
}
