#![allow(dead_code)]
//! Call-counting and failing backend doubles shared across test binaries.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ragloom::history::{
    ConversationLog, ConversationTurn, HistoryError, InMemoryConversationLog,
};
use ragloom::index::{ChunkRecord, IndexError, InMemoryIndex, VectorIndex};

/// Wraps [`InMemoryIndex`] and counts calls per operation so tests can
/// assert which retrieval path ran.
pub struct RecordingIndex {
    inner: InMemoryIndex,
    searches: AtomicUsize,
    samples: AtomicUsize,
    inserts: AtomicUsize,
    last_k: AtomicUsize,
}

impl RecordingIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: InMemoryIndex::new(dimensions),
            searches: AtomicUsize::new(0),
            samples: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            last_k: AtomicUsize::new(0),
        }
    }

    pub fn search_calls(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// The `top_k` passed to the most recent search.
    pub fn last_search_k(&self) -> usize {
        self.last_k.load(Ordering::SeqCst)
    }

    pub fn sample_calls(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), IndexError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_chunks(chunks).await
    }

    async fn search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, IndexError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.last_k.store(top_k, Ordering::SeqCst);
        self.inner.search(namespace, query, top_k).await
    }

    async fn sample_leading(
        &self,
        namespace: &str,
        limit: usize,
    ) -> Result<Vec<ChunkRecord>, IndexError> {
        self.samples.fetch_add(1, Ordering::SeqCst);
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

/// Index whose every operation fails with a storage error.
pub struct FailingIndex;

fn index_offline() -> IndexError {
    IndexError::Storage("index offline".to_string())
}

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn insert_chunks(&self, _chunks: Vec<ChunkRecord>) -> Result<(), IndexError> {
        Err(index_offline())
    }

    async fn search(
        &self,
        _namespace: &str,
        _query: &[f32],
        _top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, IndexError> {
        Err(index_offline())
    }

    async fn sample_leading(
        &self,
        _namespace: &str,
        _limit: usize,
    ) -> Result<Vec<ChunkRecord>, IndexError> {
        Err(index_offline())
    }

    async fn has_vectors(&self, _namespace: &str) -> Result<bool, IndexError> {
        Err(index_offline())
    }

    async fn delete_namespace(&self, _namespace: &str) -> Result<usize, IndexError> {
        Err(index_offline())
    }

    async fn count(&self, _namespace: &str) -> Result<usize, IndexError> {
        Err(index_offline())
    }
}

/// Wraps [`InMemoryConversationLog`] and counts reads and appends.
pub struct RecordingLog {
    inner: InMemoryConversationLog,
    appends: AtomicUsize,
    reads: AtomicUsize,
}

impl RecordingLog {
    pub fn new() -> Self {
        Self {
            inner: InMemoryConversationLog::new(),
            appends: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn append_calls(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationLog for RecordingLog {
    async fn start_chat(&self, chat_id: &str) -> Result<(), HistoryError> {
        self.inner.start_chat(chat_id).await
    }

    async fn append(&self, chat_id: &str, turn: ConversationTurn) -> Result<(), HistoryError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.inner.append(chat_id, turn).await
    }

    async fn last_n(
        &self,
        chat_id: &str,
        n: usize,
    ) -> Result<Vec<Vec<ConversationTurn>>, HistoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.last_n(chat_id, n).await
    }
}

/// Conversation log whose every operation fails with a storage error.
pub struct FailingLog;

fn history_offline() -> HistoryError {
    HistoryError::Storage("history db offline".to_string())
}

#[async_trait]
impl ConversationLog for FailingLog {
    async fn start_chat(&self, _chat_id: &str) -> Result<(), HistoryError> {
        Err(history_offline())
    }

    async fn append(&self, _chat_id: &str, _turn: ConversationTurn) -> Result<(), HistoryError> {
        Err(history_offline())
    }

    async fn last_n(
        &self,
        _chat_id: &str,
        _n: usize,
    ) -> Result<Vec<Vec<ConversationTurn>>, HistoryError> {
        Err(history_offline())
    }
}
