use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chunk::Chunk;
use crate::embed::{Embedder, Embedding};
use crate::store::{IndexEntry, Metric, SearchResult, VectorStore};
use crate::{Error, Result};

/// Options for [`VectorIndex::build`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub metric: Metric,
    /// Chunks sent to the embedder per call.
    pub batch_size: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            metric: Metric::Cosine,
            batch_size: 32,
        }
    }
}

/// In-memory vector index with brute-force search.
///
/// Entries keep insertion order, which is also document order after a build.
/// Suitable for the few thousand chunks a document upload produces.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    pub(crate) model: String,
    pub(crate) metric: Metric,
    pub(crate) dimension: usize,
    pub(crate) entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` from `model`.
    #[must_use]
    pub fn new(model: impl Into<String>, metric: Metric, dimension: usize) -> Self {
        Self {
            model: model.into(),
            metric,
            dimension,
            entries: Vec::new(),
        }
    }

    /// Embed every chunk and build a fresh index over them.
    ///
    /// The build is all-or-nothing: any embedding failure aborts it and no
    /// index is returned. `cancel` is checked before every batch.
    ///
    /// # Errors
    /// - [`Error::Config`] if `options.batch_size` is zero
    /// - [`Error::Embedding`] if the embedder fails or returns vectors that do
    ///   not line up with the chunks
    /// - [`Error::Cancelled`] if `cancel` fires between batches
    pub fn build<E: Embedder + ?Sized>(
        chunks: &[Chunk],
        embedder: &mut E,
        options: &BuildOptions,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_string()));
        }

        let mut index = Self::new(embedder.model_name(), options.metric, embedder.dimension());
        for batch in chunks.chunks(options.batch_size) {
            if cancel.is_cancelled() {
                warn!(embedded = index.len(), total = chunks.len(), "index build cancelled");
                return Err(Error::Cancelled);
            }

            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let embeddings = embedder.embed_documents(&texts)?;
            if embeddings.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }

            index.insert(batch, &embeddings).map_err(|e| match e {
                Error::InvalidInput(msg) => Error::Embedding(msg),
                other => other,
            })?;
            debug!(embedded = index.len(), total = chunks.len(), "embedded batch");
        }

        if index.dimension != embedder.dimension() {
            debug!(
                expected = embedder.dimension(),
                actual = index.dimension,
                "embedder produced a different dimension than advertised"
            );
        }
        info!(
            chunks = index.len(),
            dimension = index.dimension,
            model = %index.model,
            "built vector index"
        );
        Ok(index)
    }

    /// Top-`k` chunks most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order. A chunk whose content already
    /// appeared higher in the ranking is skipped, so results never repeat
    /// text. `k` larger than the index returns every distinct chunk.
    ///
    /// # Errors
    /// [`Error::InvalidInput`] if `k` is zero or `query` does not match the
    /// index dimension.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be at least 1".to_string()));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(Error::InvalidInput(format!(
                "query vector has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidInput("query vector holds non-finite values".to_string()));
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (self.metric.score(query, &entry.vector), entry))
            .collect();
        // stable sort: ties stay in insertion order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut seen = HashSet::new();
        Ok(scored
            .into_iter()
            .filter(|(_, entry)| seen.insert(entry.chunk.content.as_str()))
            .take(k)
            .map(|(score, entry)| SearchResult {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    /// Name of the embedding model the vectors came from.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Stored entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

impl VectorStore for VectorIndex {
    fn insert(&mut self, chunks: &[Chunk], embeddings: &[Embedding]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(Error::InvalidInput(format!(
                "got {} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        // the first vector fixes the dimension of an empty index
        let dimension = match embeddings.first() {
            Some(first) if self.entries.is_empty() => first.len(),
            _ => self.dimension,
        };
        for embedding in embeddings {
            if embedding.is_empty() || embedding.len() != dimension {
                return Err(Error::InvalidInput(format!(
                    "embedding has dimension {}, index expects {dimension}",
                    embedding.len()
                )));
            }
            if embedding.iter().any(|x| !x.is_finite()) {
                return Err(Error::InvalidInput(
                    "embedding holds non-finite values".to_string(),
                ));
            }
        }

        self.dimension = dimension;
        self.entries
            .extend(chunks.iter().zip(embeddings).map(|(chunk, vector)| IndexEntry {
                chunk: chunk.clone(),
                vector: vector.clone(),
            }));
        Ok(())
    }

    fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.query(query_embedding, k)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkMetadata;
    use crate::testing::KeywordEmbedder;

    fn make_chunk(content: &str) -> Chunk {
        Chunk::new(content, ChunkMetadata::default())
    }

    fn abc_index() -> VectorIndex {
        let mut index = VectorIndex::new("test", Metric::Cosine, 3);
        let chunks = vec![make_chunk("A"), make_chunk("B"), make_chunk("C")];
        let embeddings = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        index.insert(&chunks, &embeddings).unwrap();
        index
    }

    #[test]
    fn test_insert_and_len() {
        let mut index = VectorIndex::new("test", Metric::Cosine, 2);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());

        let chunks = vec![make_chunk("hello"), make_chunk("world")];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];

        index.insert(&chunks, &embeddings).unwrap();
        assert_eq!(index.len(), 2);
        assert!(!index.is_empty());
    }

    #[test]
    fn test_identity_retrieval() {
        let index = abc_index();
        let results = index.query(&[1.0, 0.0, 0.0], 1).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.content, "A");
    }

    #[test]
    fn test_search_returns_sorted() {
        let mut index = VectorIndex::new("test", Metric::Cosine, 3);
        let chunks = vec![
            make_chunk("far away"),
            make_chunk("very close"),
            make_chunk("medium"),
        ];
        let embeddings = vec![
            vec![0.0, 1.0, 0.0], // orthogonal to query
            vec![1.0, 0.0, 0.0], // identical to query
            vec![0.5, 0.5, 0.0], // somewhat similar
        ];
        index.insert(&chunks, &embeddings).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 3).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.content, "very close");
        assert_eq!(results[1].chunk.content, "medium");
        assert_eq!(results[2].chunk.content, "far away");
    }

    #[test]
    fn test_search_respects_k() {
        let index = abc_index();
        let results = index.query(&[1.0, 1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_k_larger_than_index_returns_all() {
        let index = abc_index();
        let results = index.query(&[0.2, 0.5, 0.9], 100).unwrap();

        let order: Vec<_> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(order, ["C", "B", "A"]);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = VectorIndex::new("test", Metric::Cosine, 2);
        let chunks = vec![make_chunk("first"), make_chunk("second"), make_chunk("third")];
        let embeddings = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0]];
        index.insert(&chunks, &embeddings).unwrap();

        let results = index.query(&[1.0, 0.0], 3).unwrap();
        let order: Vec<_> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(order, ["second", "third", "first"]);
    }

    #[test]
    fn test_duplicate_content_returned_once() {
        let mut index = VectorIndex::new("test", Metric::Cosine, 2);
        let chunks = vec![make_chunk("same"), make_chunk("other"), make_chunk("same")];
        let embeddings = vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![1.0, 0.0]];
        index.insert(&chunks, &embeddings).unwrap();

        let results = index.query(&[1.0, 0.0], 3).unwrap();
        let order: Vec<_> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(order, ["same", "other"]);
    }

    #[test]
    fn test_zero_k_is_rejected() {
        let index = abc_index();
        assert!(matches!(index.query(&[1.0, 0.0, 0.0], 0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = abc_index();
        assert!(matches!(index.query(&[1.0, 0.0], 1), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_empty_search() {
        let index = VectorIndex::new("test", Metric::Cosine, 2);
        let results = index.query(&[1.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_insert_rejects_inconsistent_dimension() {
        let mut index = abc_index();
        let result = index.insert(&[make_chunk("D")], &[vec![1.0, 0.0]]);

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_clear() {
        let mut index = abc_index();
        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn test_build_embeds_in_batches() {
        let mut embedder = KeywordEmbedder::new(&["cat", "dog", "fish"]);
        let chunks: Vec<_> = ["cat cat", "dog", "fish", "cat dog", "dog fish"]
            .into_iter()
            .map(make_chunk)
            .collect();
        let options = BuildOptions {
            metric: Metric::Cosine,
            batch_size: 2,
        };

        let index = VectorIndex::build(&chunks, &mut embedder, &options, &CancellationToken::new()).unwrap();

        assert_eq!(embedder.calls, 3);
        assert_eq!(index.len(), 5);
        assert_eq!(index.dimension(), 3);
        assert_eq!(index.model(), "keyword-test");
        assert_eq!(index.entries()[3].chunk.content, "cat dog");
    }

    #[test]
    fn test_build_aborts_on_embedding_failure() {
        let mut embedder = KeywordEmbedder::new(&["cat", "dog"]);
        embedder.fail_on_call = Some(1);
        let chunks: Vec<_> = ["cat", "dog", "cat dog"].into_iter().map(make_chunk).collect();
        let options = BuildOptions {
            metric: Metric::Cosine,
            batch_size: 1,
        };

        let result = VectorIndex::build(&chunks, &mut embedder, &options, &CancellationToken::new());
        assert!(matches!(result, Err(Error::Embedding(_))));
    }

    #[test]
    fn test_build_stops_when_cancelled() {
        let mut embedder = KeywordEmbedder::new(&["cat"]);
        let chunks = vec![make_chunk("cat")];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = VectorIndex::build(&chunks, &mut embedder, &BuildOptions::default(), &cancel);

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(embedder.calls, 0);
    }

    /// Fires the token while embedding its first batch.
    struct InterruptedEmbedder {
        cancel: CancellationToken,
        calls: usize,
    }

    impl Embedder for InterruptedEmbedder {
        fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
            self.calls += 1;
            self.cancel.cancel();
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn embed_query(&mut self, _text: &str) -> Result<Embedding> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "interrupted"
        }
    }

    #[test]
    fn test_build_stops_between_batches() {
        let cancel = CancellationToken::new();
        let mut embedder = InterruptedEmbedder {
            cancel: cancel.clone(),
            calls: 0,
        };
        let chunks: Vec<_> = ["one", "two", "three"].into_iter().map(make_chunk).collect();
        let options = BuildOptions {
            metric: Metric::Cosine,
            batch_size: 1,
        };

        let result = VectorIndex::build(&chunks, &mut embedder, &options, &cancel);

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(embedder.calls, 1);
    }

    #[test]
    fn test_build_rejects_zero_batch_size() {
        let mut embedder = KeywordEmbedder::new(&["cat"]);
        let options = BuildOptions {
            metric: Metric::Cosine,
            batch_size: 0,
        };
        let result = VectorIndex::build(&[], &mut embedder, &options, &CancellationToken::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
