//! Deterministic provider doubles for tests and offline runs.
//!
//! [`MockEmbeddings`] derives vectors from a hash of the input text, so
//! identical text always lands on identical vectors. [`MockCompletions`]
//! replays a script of canned outcomes and records every prompt it sees.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CompletionProvider, EmbeddingProvider, ProviderError};

/// Hash-derived embeddings with a configurable vector width.
pub struct MockEmbeddings {
    dimensions: usize,
}

impl MockEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts
            .iter()
            .map(|text| hash_to_vec(text, self.dimensions))
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn id(&self) -> &str {
        "mock-embeddings"
    }
}

fn hash_to_vec(text: &str, dimensions: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..dimensions)
        .map(|i| {
            let bits = seed.rotate_left(i as u32 * 8) ^ ((i as u64) << 24);
            (bits as f32) / u32::MAX as f32
        })
        .collect()
}

/// Scripted completion double.
///
/// Outcomes are consumed front to back; once the script runs dry every
/// further call answers with the default text. [`failing`](Self::failing)
/// builds a double that errors on every call instead.
pub struct MockCompletions {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<Vec<String>>,
    default_answer: String,
    always_fail: bool,
}

impl MockCompletions {
    /// Answer every prompt with the same text.
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            default_answer: answer.into(),
            always_fail: false,
        }
    }

    /// Replay the given outcomes in order, then fall back to a stock answer.
    pub fn scripted(steps: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
            default_answer: "mock answer".to_string(),
            always_fail: false,
        }
    }

    /// Fail every call with a backend error.
    pub fn failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            default_answer: String::new(),
            always_fail: true,
        }
    }

    /// Every prompt received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletions {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.lock().push(prompt.to_string());
        if self.always_fail {
            return Err(ProviderError::backend("mock", "scripted failure"));
        }
        match self.script.lock().pop_front() {
            Some(step) => step,
            None => Ok(self.default_answer.clone()),
        }
    }

    fn id(&self) -> &str {
        "mock-completions"
    }
}
