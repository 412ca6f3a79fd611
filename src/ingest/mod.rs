//! Document ingestion: hash, dedup-check, extract, chunk, embed, store.
//!
//! * [`hash`] — streaming SHA-256 content hashing; the hex digest is the
//!   document's namespace.
//! * [`extract`] — pluggable text extraction, PDF and plain text in-crate.
//! * [`chunk`] — overlapping character windows with lineage metadata.
//!
//! [`IngestionPipeline`] sequences them: validate the file, hash it, skip
//! if the namespace already holds vectors, otherwise extract, chunk, embed
//! and store. Like the query pipeline it never returns a raw error; every
//! run ends in an [`IngestReport`].

pub mod chunk;
pub mod extract;
pub mod hash;

use std::path::Path;
use std::sync::Arc;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServiceConfig;
use crate::index::{IndexError, VectorIndex};
use crate::providers::{EmbeddingProvider, ProviderError};

pub use extract::{PdfExtractor, PlainTextExtractor, TextExtractor};

/// Texts embedded per provider call while processing a document.
const EMBED_BATCH: usize = 64;

/// Errors raised while turning a file into stored chunks.
#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    #[diagnostic(code(ragloom::ingest::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("text extraction failed: {0}")]
    #[diagnostic(code(ragloom::ingest::extract))]
    Extract(String),

    #[error("no text could be extracted from {path}")]
    #[diagnostic(
        code(ragloom::ingest::empty_document),
        help("Scanned PDFs without a text layer cannot be ingested.")
    )]
    EmptyDocument { path: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Embedding(#[from] ProviderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Index(#[from] IndexError),
}

/// Step and terminal tags for an ingestion run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    ValidationFailed,
    FileNotFound,
    InvalidFileType,
    FileValidated,
    HashGenerated,
    HashGenerationError,
    VectorsExist,
    VectorsNotFound,
    VectorCheckError,
    DocumentProcessed,
    ProcessingError,
    CompletedSuccessfully,
    CompletedWithErrors,
}

impl IngestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IngestStatus::ValidationFailed => "validation_failed",
            IngestStatus::FileNotFound => "file_not_found",
            IngestStatus::InvalidFileType => "invalid_file_type",
            IngestStatus::FileValidated => "file_validated",
            IngestStatus::HashGenerated => "hash_generated",
            IngestStatus::HashGenerationError => "hash_generation_error",
            IngestStatus::VectorsExist => "vectors_exist",
            IngestStatus::VectorsNotFound => "vectors_not_found",
            IngestStatus::VectorCheckError => "vector_check_error",
            IngestStatus::DocumentProcessed => "document_processed",
            IngestStatus::ProcessingError => "processing_error",
            IngestStatus::CompletedSuccessfully => "completed_successfully",
            IngestStatus::CompletedWithErrors => "completed_with_errors",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            IngestStatus::ValidationFailed
                | IngestStatus::FileNotFound
                | IngestStatus::InvalidFileType
                | IngestStatus::HashGenerationError
                | IngestStatus::VectorCheckError
                | IngestStatus::ProcessingError
                | IngestStatus::CompletedWithErrors
        )
    }
}

/// Result record for one ingestion attempt.
#[derive(Clone, Debug, Serialize)]
pub struct IngestReport {
    pub path: String,
    /// Content-hash namespace the document landed in (or would land in).
    pub namespace: Option<String>,
    pub file_hash: Option<String>,
    pub success: bool,
    /// Terminal status, `completed_successfully` or `completed_with_errors`.
    pub status: IngestStatus,
    pub error_message: Option<String>,
    pub chunks_written: usize,
    /// True when the namespace was already populated and nothing was written.
    pub skipped_existing: bool,
}

struct IngestState {
    path: String,
    namespace: Option<String>,
    file_hash: Option<String>,
    status: IngestStatus,
    error_message: Option<String>,
    chunks_written: usize,
    skipped_existing: bool,
}

impl IngestState {
    fn new(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            namespace: None,
            file_hash: None,
            status: IngestStatus::ValidationFailed,
            error_message: None,
            chunks_written: 0,
            skipped_existing: false,
        }
    }
}

/// Idempotent file-to-index ingestion.
pub struct IngestionPipeline {
    index: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    extractors: Vec<Box<dyn TextExtractor>>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl IngestionPipeline {
    /// Build a pipeline with the default extractors (PDF and plain text).
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            index,
            embeddings,
            extractors: vec![Box::new(PdfExtractor), Box::new(PlainTextExtractor)],
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }

    /// Register an additional extractor, tried after the defaults.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// Ingest one file to completion. Never fails: every step folds its
    /// errors into the report.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn run(&self, path: &Path) -> IngestReport {
        let mut state = IngestState::new(path);

        let Some(extractor) = self.validate(path, &mut state) else {
            return finalize(state);
        };

        match hash::hash_file(path).await {
            Ok(hash) => {
                debug!(hash = %hash, "content hash computed");
                state.file_hash = Some(hash.clone());
                state.namespace = Some(hash);
                state.status = IngestStatus::HashGenerated;
            }
            Err(err) => {
                error!(error = %err, "content hashing failed");
                state.error_message = Some(format!("Hash generation error: {err}"));
                state.status = IngestStatus::HashGenerationError;
                return finalize(state);
            }
        }
        let namespace = state.namespace.clone().unwrap_or_default();

        match self.index.has_vectors(&namespace).await {
            Ok(true) => {
                info!(namespace = %namespace, "vectors already present, skipping ingestion");
                state.status = IngestStatus::VectorsExist;
                state.skipped_existing = true;
                return finalize(state);
            }
            Ok(false) => state.status = IngestStatus::VectorsNotFound,
            Err(err) => {
                // Writing anyway could materialize the namespace twice.
                warn!(error = %err, "vector existence check failed");
                state.error_message = Some(format!("Vector check error: {err}"));
                state.status = IngestStatus::VectorCheckError;
                return finalize(state);
            }
        }

        match self.process(path, extractor, &namespace).await {
            Ok(written) => {
                state.chunks_written = written;
                state.status = IngestStatus::DocumentProcessed;
            }
            Err(err) => {
                error!(error = %err, "document processing failed");
                state.error_message = Some(format!("Document processing error: {err}"));
                state.status = IngestStatus::ProcessingError;
            }
        }
        finalize(state)
    }

    /// Reject empty, missing, or unclaimed paths before any IO on content.
    fn validate<'a>(
        &'a self,
        path: &Path,
        state: &mut IngestState,
    ) -> Option<&'a dyn TextExtractor> {
        if path.as_os_str().is_empty() {
            warn!("empty file path");
            state.error_message = Some("File path is empty".to_string());
            state.status = IngestStatus::ValidationFailed;
            return None;
        }
        if !path.exists() {
            warn!("file not found");
            state.error_message = Some(format!("File not found: {}", path.display()));
            state.status = IngestStatus::FileNotFound;
            return None;
        }
        match self
            .extractors
            .iter()
            .find(|extractor| extractor.supports(path))
        {
            Some(extractor) => {
                state.status = IngestStatus::FileValidated;
                Some(extractor.as_ref())
            }
            None => {
                warn!("no extractor accepts this file");
                state.error_message = Some(format!("Unsupported file type: {}", path.display()));
                state.status = IngestStatus::InvalidFileType;
                None
            }
        }
    }

    async fn process(
        &self,
        path: &Path,
        extractor: &dyn TextExtractor,
        namespace: &str,
    ) -> Result<usize, IngestError> {
        let bytes = fs::read(path).await.map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let text = extractor.extract(&bytes)?;
        if text.trim().is_empty() {
            return Err(IngestError::EmptyDocument {
                path: path.display().to_string(),
            });
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let texts = chunk::chunk_text(&text, self.chunk_size, self.chunk_overlap);
        debug!(chunks = texts.len(), file = %file_name, "document chunked");

        let mut written = 0;
        let mut remaining = texts.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<String> = remaining.by_ref().take(EMBED_BATCH).collect();
            let vectors = self.embeddings.embed_batch(&batch).await?;
            let count = batch.len();
            let records =
                chunk::into_records(namespace, &file_name, namespace, written, batch, vectors);
            self.index.insert_chunks(records).await?;
            written += count;
        }
        Ok(written)
    }
}

/// Normalize the terminal status and emit the report.
fn finalize(state: IngestState) -> IngestReport {
    let success = !state.status.is_error();
    let status = if success {
        IngestStatus::CompletedSuccessfully
    } else {
        IngestStatus::CompletedWithErrors
    };
    info!(
        status = status.as_str(),
        last_step = state.status.as_str(),
        chunks = state.chunks_written,
        "ingestion finished"
    );

    IngestReport {
        path: state.path,
        namespace: state.namespace,
        file_hash: state.file_hash,
        success,
        status,
        error_message: state.error_message,
        chunks_written: state.chunks_written,
        skipped_existing: state.skipped_existing,
    }
}
