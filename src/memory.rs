//! Long-lived conversational memory.
//!
//! Question/answer pairs are embedded and stored in a reserved namespace of
//! the vector index. Recall is a similarity search against that namespace,
//! so later questions pull up semantically related exchanges rather than the
//! literal last few turns (that job belongs to [`crate::history`]).

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use crate::index::{ChunkRecord, IndexError, VectorIndex};
use crate::providers::{EmbeddingProvider, ProviderError};

/// Errors surfaced by memory recall and persistence.
#[derive(Debug, Error, Diagnostic)]
pub enum MemoryError {
    /// Embedding the memory text failed.
    #[error("memory embedding failed: {0}")]
    #[diagnostic(code(ragloom::memory::embedding))]
    Embedding(#[from] ProviderError),

    /// Reading or writing the memory namespace failed.
    #[error("memory index failed: {0}")]
    #[diagnostic(code(ragloom::memory::index))]
    Index(#[from] IndexError),
}

/// Vector-backed store of past question/answer exchanges.
pub struct SemanticMemory {
    index: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    namespace: String,
    recall_k: usize,
}

impl SemanticMemory {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            index,
            embeddings,
            namespace: namespace.into(),
            recall_k: 3,
        }
    }

    /// How many related exchanges a recall pulls back.
    #[must_use]
    pub fn with_recall_k(mut self, recall_k: usize) -> Self {
        self.recall_k = recall_k;
        self
    }

    /// Namespace the memory lives in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Persist one exchange for future recall.
    #[instrument(skip(self, question, answer), fields(namespace = %self.namespace))]
    pub async fn record(&self, question: &str, answer: &str) -> Result<(), MemoryError> {
        let text = format!("question: {question}\nanswer: {answer}");
        let embedding = self.embeddings.embed_one(&text).await?;
        let record =
            ChunkRecord::new(&self.namespace, "memory", 0, text).with_embedding(embedding);
        self.index.insert_chunks(vec![record]).await?;
        Ok(())
    }

    /// Fetch exchanges related to `query`, joined into one prompt block.
    ///
    /// Returns an empty string when nothing relevant is stored.
    #[instrument(skip(self, query), fields(namespace = %self.namespace))]
    pub async fn recall(&self, query: &str) -> Result<String, MemoryError> {
        let embedding = self.embeddings.embed_one(query).await?;
        let hits = self
            .index
            .search(&self.namespace, &embedding, self.recall_k)
            .await?;
        Ok(hits
            .into_iter()
            .map(|(record, _)| record.content)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemoryIndex;
    use crate::providers::MockEmbeddings;

    fn memory() -> SemanticMemory {
        let index = Arc::new(InMemoryIndex::new(8));
        let embeddings = Arc::new(MockEmbeddings::new(8));
        SemanticMemory::new(index, embeddings, "conversation-memory")
    }

    #[tokio::test]
    async fn recorded_exchange_comes_back_on_recall() {
        let memory = memory();
        memory
            .record("What is borrowing?", "Temporary access to a value.")
            .await
            .unwrap();

        let recalled = memory.recall("What is borrowing?").await.unwrap();
        assert!(recalled.contains("question: What is borrowing?"));
        assert!(recalled.contains("answer: Temporary access to a value."));
    }

    #[tokio::test]
    async fn empty_memory_recalls_empty_string() {
        let memory = memory();
        assert_eq!(memory.recall("anything").await.unwrap(), "");
    }

    #[tokio::test]
    async fn recall_joins_multiple_hits() {
        let memory = memory().with_recall_k(2);
        memory.record("q one", "a one").await.unwrap();
        memory.record("q two", "a two").await.unwrap();

        let recalled = memory.recall("q").await.unwrap();
        assert_eq!(recalled.matches("question:").count(), 2);
        assert!(recalled.contains("\n\n"));
    }
}
