//! In-memory vector index.
//!
//! Brute-force cosine scan over per-namespace buckets. Useful for tests and
//! for small corpora where spinning up SQLite is not worth it.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::warn;

use super::{ChunkRecord, IndexError, VectorIndex};

/// Vector index held entirely in process memory.
pub struct InMemoryIndex {
    dimensions: usize,
    namespaces: RwLock<FxHashMap<String, Vec<ChunkRecord>>>,
}

impl InMemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            namespaces: RwLock::new(FxHashMap::default()),
        }
    }

    /// Vector width this index accepts.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), IndexError> {
        let mut accepted = Vec::with_capacity(chunks.len());
        for record in chunks {
            let Some(embedding) = record.embedding.as_ref() else {
                warn!(id = %record.id, "skipping chunk without embedding");
                continue;
            };
            if embedding.len() != self.dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimensions,
                    got: embedding.len(),
                });
            }
            accepted.push(record);
        }

        let mut namespaces = self.namespaces.write();
        for record in accepted {
            namespaces
                .entry(record.namespace.clone())
                .or_default()
                .push(record);
        }
        Ok(())
    }

    async fn search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let namespaces = self.namespaces.read();
        let Some(records) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(ChunkRecord, f32)> = records
            .iter()
            .filter_map(|record| {
                let embedding = record.embedding.as_ref()?;
                Some((record.clone(), cosine_similarity(query, embedding)))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn sample_leading(
        &self,
        namespace: &str,
        limit: usize,
    ) -> Result<Vec<ChunkRecord>, IndexError> {
        let namespaces = self.namespaces.read();
        let Some(records) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut sample: Vec<ChunkRecord> = records.to_vec();
        sample.sort_by_key(|record| record.chunk_index);
        sample.truncate(limit);
        Ok(sample)
    }

    async fn has_vectors(&self, namespace: &str) -> Result<bool, IndexError> {
        let namespaces = self.namespaces.read();
        Ok(namespaces
            .get(namespace)
            .is_some_and(|records| !records.is_empty()))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<usize, IndexError> {
        let mut namespaces = self.namespaces.write();
        Ok(namespaces
            .remove(namespace)
            .map_or(0, |records| records.len()))
    }

    async fn count(&self, namespace: &str) -> Result<usize, IndexError> {
        let namespaces = self.namespaces.read();
        Ok(namespaces.get(namespace).map_or(0, Vec::len))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
