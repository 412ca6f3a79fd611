//! Context assembly for document question answering and summarization.
//!
//! Two disjoint retrieval strategies live here. QA uses similarity search
//! with a per-namespace share of the requested `top_k`, so the assembled
//! context stays bounded no matter how many documents a user selects.
//! Summaries skip similarity entirely and take the leading chunks of each
//! namespace. The two paths intentionally share no retrieval code.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::index::VectorIndex;
use crate::providers::{EmbeddingProvider, ProviderError};

/// Marker injected when no chunk matched anywhere.
pub const NO_CONTEXT: &str = "No relevant context found.";

/// Errors surfaced by context assembly.
#[derive(Debug, Error, Diagnostic)]
pub enum RetrievalError {
    /// The query could not be embedded, so no namespace could be searched.
    #[error("query embedding failed: {0}")]
    #[diagnostic(code(ragloom::retrieval::embedding))]
    Embedding(#[from] ProviderError),

    /// Every selected namespace failed its lookup.
    #[error("context lookup failed for all {count} namespaces: {last_error}")]
    #[diagnostic(code(ragloom::retrieval::lookup))]
    Lookup { count: usize, last_error: String },
}

/// Fetches and concatenates document context from one or more namespaces.
pub struct ContextAssembler {
    index: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl ContextAssembler {
    pub fn new(index: Arc<dyn VectorIndex>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, embeddings }
    }

    /// Similarity-ranked context for `question` across `namespaces`.
    ///
    /// Namespaces are queried in the given order with a divided share of
    /// `top_k` each, and the assembled block is capped at `top_k` chunks
    /// total. A failed lookup in one namespace is logged and skipped; only
    /// when every namespace fails does assembly itself fail. No matches at
    /// all yields the [`NO_CONTEXT`] marker so downstream prompts stay
    /// well-formed.
    #[instrument(skip(self, question), fields(namespaces = namespaces.len(), top_k))]
    pub async fn assemble(
        &self,
        question: &str,
        namespaces: &[String],
        top_k: usize,
    ) -> Result<String, RetrievalError> {
        if namespaces.is_empty() {
            return Ok(NO_CONTEXT.to_string());
        }

        let query = self.embeddings.embed_one(question).await?;
        let per_namespace = per_namespace_k(top_k, namespaces.len());

        let mut texts = Vec::new();
        let mut failures = 0usize;
        let mut last_error = String::new();
        for namespace in namespaces {
            match self.index.search(namespace, &query, per_namespace).await {
                Ok(hits) => {
                    texts.extend(hits.into_iter().map(|(record, _)| record.content));
                }
                Err(err) => {
                    warn!(namespace = %namespace, error = %err, "namespace lookup failed, skipping");
                    failures += 1;
                    last_error = err.to_string();
                }
            }
        }

        if failures == namespaces.len() {
            return Err(RetrievalError::Lookup {
                count: failures,
                last_error,
            });
        }

        texts.truncate(top_k);
        if texts.is_empty() {
            return Ok(NO_CONTEXT.to_string());
        }
        Ok(texts.join("\n\n"))
    }

    /// Unranked leading sample for summarization: the first
    /// `per_namespace` chunks of each namespace, joined with newlines.
    #[instrument(skip(self), fields(namespaces = namespaces.len(), per_namespace))]
    pub async fn sample_for_summary(
        &self,
        namespaces: &[String],
        per_namespace: usize,
    ) -> Result<String, RetrievalError> {
        if namespaces.is_empty() {
            return Ok(String::new());
        }

        let mut texts = Vec::new();
        let mut failures = 0usize;
        let mut last_error = String::new();
        for namespace in namespaces {
            match self.index.sample_leading(namespace, per_namespace).await {
                Ok(chunks) => {
                    texts.extend(chunks.into_iter().map(|record| record.content));
                }
                Err(err) => {
                    warn!(namespace = %namespace, error = %err, "namespace sample failed, skipping");
                    failures += 1;
                    last_error = err.to_string();
                }
            }
        }

        if failures == namespaces.len() {
            return Err(RetrievalError::Lookup {
                count: failures,
                last_error,
            });
        }
        Ok(texts.join("\n"))
    }
}

/// Each namespace gets an equal share of `top_k`, never less than one.
fn per_namespace_k(top_k: usize, namespace_count: usize) -> usize {
    (top_k / namespace_count.max(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ChunkRecord, InMemoryIndex, IndexError};
    use crate::providers::MockEmbeddings;
    use async_trait::async_trait;

    /// Index wrapper that fails lookups for chosen namespaces.
    struct FlakyIndex {
        inner: InMemoryIndex,
        broken: Vec<String>,
    }

    #[async_trait]
    impl VectorIndex for FlakyIndex {
        async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), IndexError> {
            self.inner.insert_chunks(chunks).await
        }

        async fn search(
            &self,
            namespace: &str,
            query: &[f32],
            top_k: usize,
        ) -> Result<Vec<(ChunkRecord, f32)>, IndexError> {
            if self.broken.iter().any(|ns| ns == namespace) {
                return Err(IndexError::Storage("simulated outage".into()));
            }
            self.inner.search(namespace, query, top_k).await
        }

        async fn sample_leading(
            &self,
            namespace: &str,
            limit: usize,
        ) -> Result<Vec<ChunkRecord>, IndexError> {
            if self.broken.iter().any(|ns| ns == namespace) {
                return Err(IndexError::Storage("simulated outage".into()));
            }
            self.inner.sample_leading(namespace, limit).await
        }

        async fn has_vectors(&self, namespace: &str) -> Result<bool, IndexError> {
            self.inner.has_vectors(namespace).await
        }

        async fn delete_namespace(&self, namespace: &str) -> Result<usize, IndexError> {
            self.inner.delete_namespace(namespace).await
        }

        async fn count(&self, namespace: &str) -> Result<usize, IndexError> {
            self.inner.count(namespace).await
        }
    }

    async fn seeded_index(dimensions: usize) -> InMemoryIndex {
        let index = InMemoryIndex::new(dimensions);
        let embeddings = MockEmbeddings::new(dimensions);
        for namespace in ["ns-a", "ns-b"] {
            let mut records = Vec::new();
            for i in 0..5 {
                let content = format!("{namespace} chunk {i}");
                let embedding = embeddings.embed_one(&content).await.unwrap();
                records.push(
                    ChunkRecord::new(namespace, "doc.pdf", i, content).with_embedding(embedding),
                );
            }
            index.insert_chunks(records).await.unwrap();
        }
        index
    }

    #[test]
    fn per_namespace_share_divides_top_k() {
        assert_eq!(per_namespace_k(6, 2), 3);
        assert_eq!(per_namespace_k(5, 1), 5);
        assert_eq!(per_namespace_k(5, 3), 1);
        assert_eq!(per_namespace_k(0, 2), 1);
    }

    #[tokio::test]
    async fn assemble_bounds_total_context_across_namespaces() {
        let index = Arc::new(seeded_index(8).await);
        let embeddings = Arc::new(MockEmbeddings::new(8));
        let assembler = ContextAssembler::new(index, embeddings);

        let namespaces = vec!["ns-a".to_string(), "ns-b".to_string()];
        let context = assembler.assemble("chunk", &namespaces, 6).await.unwrap();

        let chunks: Vec<&str> = context.split("\n\n").collect();
        assert!(chunks.len() <= 6);
        // Namespace order, then rank within each namespace.
        let first_b = chunks.iter().position(|c| c.starts_with("ns-b"));
        let last_a = chunks.iter().rposition(|c| c.starts_with("ns-a"));
        if let (Some(first_b), Some(last_a)) = (first_b, last_a) {
            assert!(last_a < first_b);
        }
    }

    #[tokio::test]
    async fn assemble_empty_everything_yields_marker() {
        let index = Arc::new(InMemoryIndex::new(8));
        let embeddings = Arc::new(MockEmbeddings::new(8));
        let assembler = ContextAssembler::new(index, embeddings);

        let namespaces = vec!["empty-ns".to_string()];
        let context = assembler.assemble("anything", &namespaces, 5).await.unwrap();
        assert_eq!(context, NO_CONTEXT);

        let no_namespaces = assembler.assemble("anything", &[], 5).await.unwrap();
        assert_eq!(no_namespaces, NO_CONTEXT);
    }

    #[tokio::test]
    async fn one_broken_namespace_does_not_abort_assembly() {
        let index = Arc::new(FlakyIndex {
            inner: seeded_index(8).await,
            broken: vec!["ns-a".to_string()],
        });
        let embeddings = Arc::new(MockEmbeddings::new(8));
        let assembler = ContextAssembler::new(index, embeddings);

        let namespaces = vec!["ns-a".to_string(), "ns-b".to_string()];
        let context = assembler.assemble("chunk", &namespaces, 6).await.unwrap();
        assert!(context.contains("ns-b"));
        assert!(!context.contains("ns-a"));
    }

    #[tokio::test]
    async fn all_namespaces_broken_is_an_error() {
        let index = Arc::new(FlakyIndex {
            inner: seeded_index(8).await,
            broken: vec!["ns-a".to_string(), "ns-b".to_string()],
        });
        let embeddings = Arc::new(MockEmbeddings::new(8));
        let assembler = ContextAssembler::new(index, embeddings);

        let namespaces = vec!["ns-a".to_string(), "ns-b".to_string()];
        let err = assembler.assemble("chunk", &namespaces, 6).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Lookup { count: 2, .. }));
    }

    #[tokio::test]
    async fn summary_sample_takes_leading_chunks_in_order() {
        let index = Arc::new(seeded_index(8).await);
        let embeddings = Arc::new(MockEmbeddings::new(8));
        let assembler = ContextAssembler::new(index, embeddings);

        let namespaces = vec!["ns-a".to_string()];
        let sample = assembler.sample_for_summary(&namespaces, 3).await.unwrap();
        assert_eq!(
            sample,
            "ns-a chunk 0\nns-a chunk 1\nns-a chunk 2"
        );
    }
}
