//! Vector index backends for chunked documents.
//!
//! The [`VectorIndex`] trait abstracts over similarity-search storage so the
//! pipelines never depend on a concrete database. Two backends ship in-crate:
//!
//! - [`sqlite::SqliteVectorIndex`] - SQLite with `sqlite-vec` cosine search
//! - [`memory::InMemoryIndex`] - map-backed index for tests and ephemeral runs
//!
//! Every record lives in exactly one namespace. Namespaces are content-hash
//! partition keys: one per ingested document, plus one reserved namespace for
//! conversational memory.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryIndex;
pub use sqlite::SqliteVectorIndex;

/// Errors surfaced by vector index backends.
#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    /// Underlying storage failure (connection, SQL, serialization).
    #[error("storage error: {0}")]
    #[diagnostic(code(ragloom::index::storage))]
    Storage(String),

    /// An embedding's width does not match the index's configured width.
    #[error("embedding dimension mismatch: index expects {expected}, got {got}")]
    #[diagnostic(
        code(ragloom::index::dimensions),
        help("Re-embed with the model the index was created for.")
    )]
    DimensionMismatch { expected: usize, got: usize },
}

/// A chunk of document text with its embedding, ready for storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier for this chunk.
    pub id: String,
    /// Namespace (content hash) this chunk belongs to.
    pub namespace: String,
    /// Display name of the source file.
    pub file_name: String,
    /// Zero-based position of this chunk within the source.
    pub chunk_index: usize,
    /// The chunk text.
    pub content: String,
    /// Additional metadata as JSON.
    pub metadata: serde_json::Value,
    /// The embedding vector (if computed).
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    /// Create a record with a fresh UUID and empty metadata.
    pub fn new(
        namespace: impl Into<String>,
        file_name: impl Into<String>,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            namespace: namespace.into(),
            file_name: file_name.into(),
            chunk_index,
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            embedding: None,
        }
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set additional metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Namespaced similarity-search storage.
///
/// Writes are idempotent in intent: inserting the same content twice does
/// not corrupt the index, but no deduplication happens beyond whole-file
/// hashing at the ingestion layer.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert chunk records under their namespaces.
    ///
    /// Records without embeddings are skipped with a warning; they cannot
    /// participate in similarity search.
    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), IndexError>;

    /// Similarity search within one namespace.
    ///
    /// Returns up to `top_k` records ordered most-similar first. An empty
    /// result is valid, not an error.
    async fn search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, IndexError>;

    /// Unconditional leading sample: the first `limit` chunks of a
    /// namespace by chunk index, no similarity involved.
    ///
    /// This is the summary path's retrieval; it deliberately shares no
    /// code with [`search`](Self::search).
    async fn sample_leading(
        &self,
        namespace: &str,
        limit: usize,
    ) -> Result<Vec<ChunkRecord>, IndexError>;

    /// Whether the namespace holds any vectors at all.
    async fn has_vectors(&self, namespace: &str) -> Result<bool, IndexError>;

    /// Delete every chunk in the namespace; returns how many were removed.
    async fn delete_namespace(&self, namespace: &str) -> Result<usize, IndexError>;

    /// Number of chunks stored in the namespace.
    async fn count(&self, namespace: &str) -> Result<usize, IndexError>;
}
