//! Agent orchestration for the routed chat flow.
//!
//! The [`ChatOrchestrator`] runs the full step sequence for one question:
//! memory recall, route classification, the chosen agent (document QA,
//! general assistant, or summarizer), and unconditional memory persistence.
//! Every step contains its own failures, so [`ChatOrchestrator::run`] always
//! returns a usable [`AgentReport`].
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragloom::{ChatOrchestrator, config::ServiceConfig};
//! use ragloom::index::InMemoryIndex;
//! use ragloom::providers::{MockCompletions, MockEmbeddings};
//!
//! let config = ServiceConfig::default();
//! let orchestrator = ChatOrchestrator::new(
//!     Arc::new(InMemoryIndex::new(config.embedding_dimensions)),
//!     Arc::new(MockEmbeddings::new(config.embedding_dimensions)),
//!     Arc::new(MockCompletions::answering("hello")),
//!     &config,
//! );
//! let report = orchestrator.run("What is attention?", &["ns".into()]).await;
//! ```

mod orchestrator;

pub use orchestrator::{AgentReport, ChatOrchestrator};
