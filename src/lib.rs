//! # Ragloom: Agentic RAG Chat Pipelines
//!
//! Ragloom turns uploaded documents into conversational knowledge: files are
//! content-addressed, chunked, embedded, and written into a namespaced vector
//! index; questions are routed between specialized answer paths (document QA,
//! general assistant, document summary) with conversational memory woven into
//! every turn.
//!
//! ```text
//! File bytes ──► ingest::IngestionPipeline ──► SHA-256 hash = namespace
//!                     │
//!                     ├─► ingest::extract (PDF / plain text)
//!                     ├─► ingest::chunk   (overlapping windows)
//!                     └─► providers::EmbeddingProvider ──► index::VectorIndex
//!
//! Question ──► agents::ChatOrchestrator
//!                     │
//!                     ├─► memory::SemanticMemory   (recall before, record after)
//!                     ├─► routing::RouteClassifier (qa | master | summarize)
//!                     ├─► retrieval::ContextAssembler
//!                     └─► providers::CompletionProvider ──► AgentReport
//!
//! Chat request ──► query::QueryPipeline ──► history::ConversationLog ──► QueryReport
//! ```
//!
//! ## Design at a Glance
//!
//! - Every pipeline entrypoint is infallible: callers always receive a
//!   well-formed report whose status fields encode degradation, never a raw
//!   error.
//! - Backend seams are traits ([`providers::EmbeddingProvider`],
//!   [`providers::CompletionProvider`], [`index::VectorIndex`],
//!   [`history::ConversationLog`]) with SQLite / Ollama defaults and
//!   deterministic in-crate mocks.
//! - Route selection is a closed enum with `Master` as the structural
//!   fallback, so a misbehaving classifier can never strand a question.
//!
//! ## Module Guide
//!
//! - [`agents`] - routed chat orchestration (the top-level state machine)
//! - [`query`] - the linear validate→history→context→generate pipeline
//! - [`ingest`] - content-addressed document ingestion
//! - [`routing`] - route enum and LLM-backed classification
//! - [`retrieval`] - bounded context assembly and summary sampling
//! - [`memory`] - embedding-indexed conversational memory
//! - [`history`] - literal per-chat conversation log
//! - [`index`] - vector index trait, SQLite and in-memory backends
//! - [`providers`] - embedding / completion provider seams
//! - [`prompts`] - the fixed prompt templates
//! - [`config`] - environment + JSON file configuration
//! - [`telemetry`] - tracing and diagnostics setup

pub mod agents;
pub mod config;
pub mod history;
pub mod index;
pub mod ingest;
pub mod memory;
pub mod prompts;
pub mod providers;
pub mod query;
pub mod retrieval;
pub mod routing;
pub mod telemetry;

pub use agents::{AgentReport, ChatOrchestrator};
pub use index::{ChunkRecord, VectorIndex};
pub use ingest::{IngestReport, IngestionPipeline};
pub use providers::{CompletionProvider, EmbeddingProvider};
pub use query::{QueryPipeline, QueryReport, QueryRequest};
pub use routing::Route;

/// Re-exports for convenient access to core types
pub mod prelude {
    pub use crate::agents::{AgentReport, ChatOrchestrator};
    pub use crate::config::ServiceConfig;
    pub use crate::history::{
        ConversationLog, ConversationTurn, InMemoryConversationLog, SqliteConversationLog,
    };
    pub use crate::index::{ChunkRecord, InMemoryIndex, SqliteVectorIndex, VectorIndex};
    pub use crate::ingest::{IngestReport, IngestStatus, IngestionPipeline};
    pub use crate::memory::SemanticMemory;
    pub use crate::providers::{
        CompletionProvider, EmbeddingProvider, MockCompletions, MockEmbeddings,
        OllamaCompletions, OllamaEmbeddings,
    };
    pub use crate::query::{ProcessingStatus, QueryPipeline, QueryReport, QueryRequest};
    pub use crate::retrieval::ContextAssembler;
    pub use crate::routing::Route;
}
