#![allow(dead_code)]
//! Seed data and canned payloads shared across test binaries.

use ragloom::index::{ChunkRecord, VectorIndex};
use ragloom::providers::{EmbeddingProvider, MockEmbeddings};

/// Vector width used by every fixture.
pub const DIMS: usize = 16;

/// Embed `texts` and store them as consecutive chunks of one document.
pub async fn seed_document(
    index: &dyn VectorIndex,
    embeddings: &MockEmbeddings,
    namespace: &str,
    texts: &[&str],
) {
    let owned: Vec<String> = texts.iter().map(|text| text.to_string()).collect();
    let vectors = embeddings.embed_batch(&owned).await.unwrap();
    let records = owned
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(chunk_index, (text, vector))| {
            ChunkRecord::new(namespace, "fixture.pdf", chunk_index, text).with_embedding(vector)
        })
        .collect();
    index.insert_chunks(records).await.unwrap();
}

/// Router JSON selecting the given agent key.
pub fn route_json(key: &str) -> String {
    format!(r#"{{"route": "{key}"}}"#)
}
