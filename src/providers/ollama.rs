//! Ollama-backed providers.
//!
//! Both adapters talk to a local Ollama daemon through rig. The daemon is
//! expected at the default address; model names come from
//! [`ServiceConfig`](crate::config::ServiceConfig).

use async_trait::async_trait;
use rig::client::{CompletionClient, EmbeddingsClient, Nothing};
use rig::completion::CompletionModel;
use rig::embeddings::embedding::EmbeddingModel as RigEmbeddingModel;
use rig::message::AssistantContent;
use rig::providers::ollama;
use tracing::instrument;

use super::{CompletionProvider, EmbeddingProvider, ProviderError};

const PROVIDER_ID: &str = "ollama";

/// Single-shot completions from an Ollama chat model.
#[derive(Clone)]
pub struct OllamaCompletions {
    client: ollama::Client,
    model: String,
    preamble: Option<String>,
    temperature: f64,
}

impl OllamaCompletions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: ollama::Client::new(Nothing)
                .expect("default ollama client configuration is valid"),
            model: model.into(),
            preamble: None,
            temperature: 0.7,
        }
    }

    /// System preamble sent with every request.
    #[must_use]
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletions {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let model = self.client.completion_model(&self.model);

        let mut request =
            model.completion_request(rig::completion::Message::user(prompt.to_string()));
        if let Some(preamble) = &self.preamble {
            request = request.preamble(preamble.clone());
        }
        let request = request.temperature(self.temperature).build();

        let response = model
            .completion(request)
            .await
            .map_err(|err| ProviderError::backend(PROVIDER_ID, err.to_string()))?;

        let text: String = response
            .choice
            .into_iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text),
                _ => None,
            })
            .collect();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: PROVIDER_ID.to_string(),
            });
        }
        Ok(text)
    }

    fn id(&self) -> &str {
        PROVIDER_ID
    }
}

/// Embeddings from an Ollama embedding model.
///
/// The vector width must match what the named model actually produces;
/// the index rejects mismatched vectors at insert time.
#[derive(Clone)]
pub struct OllamaEmbeddings {
    client: ollama::Client,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddings {
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client: ollama::Client::new(Nothing)
                .expect("default ollama client configuration is valid"),
            model: model.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    #[instrument(skip(self, texts), fields(model = %self.model, batch = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self
            .client
            .embedding_model_with_ndims(&self.model, self.dimensions);
        let embeddings = model
            .embed_texts(texts.to_vec())
            .await
            .map_err(|err| ProviderError::backend(PROVIDER_ID, err.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(ProviderError::BatchMismatch {
                sent: texts.len(),
                received: embeddings.len(),
            });
        }

        Ok(embeddings
            .into_iter()
            .map(|embedding| embedding.vec.into_iter().map(|v| v as f32).collect())
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn id(&self) -> &str {
        PROVIDER_ID
    }
}
