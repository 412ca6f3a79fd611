//! The routed chat state machine.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::ServiceConfig;
use crate::index::VectorIndex;
use crate::memory::SemanticMemory;
use crate::prompts;
use crate::providers::{CompletionProvider, EmbeddingProvider, complete_with_retry};
use crate::retrieval::{ContextAssembler, NO_CONTEXT};
use crate::routing::{Route, RouteClassifier, RouteDecision};

/// Outcome of one orchestrated question.
#[derive(Clone, Debug, Serialize)]
pub struct AgentReport {
    pub question: String,
    pub route: Route,
    pub answer: String,
    /// Raw classifier output, when the classifier ran.
    pub raw_router_output: Option<String>,
    /// True when routing fell back to `master` after a classification failure.
    pub fallback_applied: bool,
    /// Whether semantic memory contributed context to this turn.
    pub memory_recalled: bool,
    /// Whether the turn was persisted to semantic memory afterwards.
    pub memory_saved: bool,
    /// True when generation failed and the apology answer was substituted.
    pub generation_failed: bool,
}

/// Runs `get_memory -> router -> {qa | master | summarize} -> save_memory`
/// for each question.
///
/// The orchestrator never returns an error: individual steps degrade (empty
/// memory, placeholder context, apology answer) and the report records what
/// happened.
pub struct ChatOrchestrator {
    memory: SemanticMemory,
    classifier: RouteClassifier,
    assembler: ContextAssembler,
    completions: Arc<dyn CompletionProvider>,
    top_k: usize,
    summary_sample_size: usize,
}

impl ChatOrchestrator {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        completions: Arc<dyn CompletionProvider>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            memory: SemanticMemory::new(
                index.clone(),
                embeddings.clone(),
                &config.memory_namespace,
            )
            .with_recall_k(config.memory_recall_k),
            classifier: RouteClassifier::new(completions.clone()),
            assembler: ContextAssembler::new(index, embeddings),
            completions,
            top_k: config.default_top_k,
            summary_sample_size: config.summary_sample_size,
        }
    }

    /// Answer one question against the namespaces selected for this request.
    ///
    /// An empty namespace selection skips classification entirely and goes
    /// straight to the general assistant: with no documents in play there is
    /// nothing for `qa` or `summarize` to work from.
    #[instrument(skip(self, question), fields(namespaces = namespaces.len()))]
    pub async fn run(&self, question: &str, namespaces: &[String]) -> AgentReport {
        // get_memory: never blocks the pipeline.
        let memory = match self.memory.recall(question).await {
            Ok(memory) => memory,
            Err(err) => {
                warn!(error = %err, "memory recall failed, continuing without");
                String::new()
            }
        };

        // router
        let decision = if namespaces.is_empty() {
            info!(route = Route::Master.as_str(), "no namespaces selected, routing structurally");
            RouteDecision {
                route: Route::Master,
                raw_response: None,
                fallback: false,
            }
        } else {
            self.classifier.classify(question, &memory).await
        };

        // qa | master | summarize
        let prompt = match decision.route {
            Route::Qa => {
                let context = match self.assembler.assemble(question, namespaces, self.top_k).await
                {
                    Ok(context) => context,
                    Err(err) => {
                        warn!(error = %err, "context assembly failed, using placeholder");
                        NO_CONTEXT.to_string()
                    }
                };
                prompts::qa_prompt(&memory, &context, question)
            }
            Route::Master => prompts::master_prompt(question),
            Route::Summarize => {
                let document_text = match self
                    .assembler
                    .sample_for_summary(namespaces, self.summary_sample_size)
                    .await
                {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(error = %err, "summary sampling failed, summarizing nothing");
                        String::new()
                    }
                };
                prompts::summary_prompt(&document_text)
            }
        };

        let (answer, generation_failed) =
            match complete_with_retry(self.completions.as_ref(), &prompt).await {
                Ok(answer) => (answer, false),
                Err(err) => {
                    warn!(error = %err, route = decision.route.as_str(), "generation failed");
                    (prompts::GENERATION_APOLOGY.to_string(), true)
                }
            };

        // save_memory: runs for every route, even degraded answers, so the
        // conversation stays reconstructable.
        let memory_saved = match self.memory.record(question, &answer).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "memory save failed");
                false
            }
        };

        AgentReport {
            question: question.to_string(),
            route: decision.route,
            answer,
            raw_router_output: decision.raw_response,
            fallback_applied: decision.fallback,
            memory_recalled: !memory.is_empty(),
            memory_saved,
            generation_failed,
        }
    }
}
