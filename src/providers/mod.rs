//! Embedding and completion backend seams.
//!
//! The core pipelines only ever talk to [`EmbeddingProvider`] and
//! [`CompletionProvider`]; the [`ollama`] module supplies rig-backed
//! defaults and [`mock`] supplies deterministic test doubles.

pub mod mock;
pub mod ollama;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

pub use mock::{MockCompletions, MockEmbeddings};
pub use ollama::{OllamaCompletions, OllamaEmbeddings};

/// Errors surfaced by embedding and completion backends.
#[derive(Debug, Error, Diagnostic)]
pub enum ProviderError {
    /// Transport, auth, or model failure reported by the backend.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(
        code(ragloom::providers::backend),
        help("Check that the backend service is running and reachable.")
    )]
    Backend { provider: String, message: String },

    /// The backend answered but produced no usable content.
    #[error("provider {provider} returned no content")]
    #[diagnostic(code(ragloom::providers::empty_response))]
    EmptyResponse { provider: String },

    /// The backend returned a different number of vectors than requested.
    #[error("embedding batch mismatch: sent {sent} texts, received {received} vectors")]
    #[diagnostic(code(ragloom::providers::batch_mismatch))]
    BatchMismatch { sent: usize, received: usize },
}

impl ProviderError {
    pub(crate) fn backend(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Text-to-vector backend.
///
/// Implementations must be deterministic for identical text so that
/// content-addressed ingestion and retrieval agree on what "the same
/// document" means.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        if vectors.len() != 1 {
            return Err(ProviderError::BatchMismatch {
                sent: 1,
                received: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }

    /// Vector width this provider produces.
    fn dimensions(&self) -> usize;

    /// Short identifier for logging and error reports.
    fn id(&self) -> &str;
}

/// Single-shot text completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for the rendered prompt.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Short identifier for logging and error reports.
    fn id(&self) -> &str;
}

/// Run a completion with one bounded retry.
///
/// Generation steps degrade to a fixed apology answer when this still
/// fails; index and history calls are never retried because their
/// failures already fall back at the step boundary.
pub async fn complete_with_retry(
    provider: &dyn CompletionProvider,
    prompt: &str,
) -> Result<String, ProviderError> {
    match provider.complete(prompt).await {
        Ok(text) => Ok(text),
        Err(first) => {
            tracing::warn!(
                provider = provider.id(),
                error = %first,
                "completion failed, retrying once"
            );
            provider.complete(prompt).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockCompletions, MockEmbeddings};
    use super::*;

    #[tokio::test]
    async fn embed_one_uses_the_batch_path() {
        let provider = MockEmbeddings::new(8);
        let single = provider.embed_one("hello").await.unwrap();
        let batch = provider
            .embed_batch(&["hello".to_string()])
            .await
            .unwrap();
        assert_eq!(single, batch[0]);
        assert_eq!(single.len(), 8);
    }

    #[tokio::test]
    async fn retry_recovers_from_one_failure() {
        let provider = MockCompletions::scripted(vec![
            Err(ProviderError::backend("mock", "transient")),
            Ok("second try".to_string()),
        ]);
        let answer = complete_with_retry(&provider, "prompt").await.unwrap();
        assert_eq!(answer, "second try");
        assert_eq!(provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_two_failures() {
        let provider = MockCompletions::failing();
        let err = complete_with_retry(&provider, "prompt").await.unwrap_err();
        assert!(matches!(err, ProviderError::Backend { .. }));
        assert_eq!(provider.calls().len(), 2, "exactly one retry");
    }
}
