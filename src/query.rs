//! The linear query pipeline behind the chat API.
//!
//! Unlike the routed orchestrator, every query here is document QA: validate,
//! pull history, pull context, render the enhanced prompt, generate, persist,
//! finalize. Each step appends a [`ProcessingStatus`] tag to a trail and
//! failures short-circuit to finalization instead of crossing step
//! boundaries. Success is judged from the whole trail, so a late recovery
//! (say, history saved fine after generation failed) cannot mask an earlier
//! fatal step.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, instrument, warn};

use crate::config::ServiceConfig;
use crate::history::{ConversationLog, ConversationTurn, format_history};
use crate::index::VectorIndex;
use crate::prompts::{self, GENERATION_APOLOGY};
use crate::providers::{CompletionProvider, EmbeddingProvider, complete_with_retry};
use crate::retrieval::{ContextAssembler, NO_CONTEXT};

/// Placeholder substituted when history retrieval itself fails.
const NO_HISTORY_AVAILABLE: &str = "No previous conversation history available.";

/// Fallback answer text when no step managed to produce one.
const NO_RESPONSE: &str = "No response generated";

/// Step tags recorded while a query moves through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    InputsValidated,
    ValidationFailed,
    ValidationError,
    HistoryRetrieved,
    HistoryRetrievalError,
    ContextRetrieved,
    ContextRetrievalError,
    PromptCreated,
    PromptCreationError,
    ResponseGenerated,
    ResponseGenerationError,
    SavedToHistory,
    HistorySavingError,
    Completed,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::InputsValidated => "inputs_validated",
            ProcessingStatus::ValidationFailed => "validation_failed",
            ProcessingStatus::ValidationError => "validation_error",
            ProcessingStatus::HistoryRetrieved => "history_retrieved",
            ProcessingStatus::HistoryRetrievalError => "history_retrieval_error",
            ProcessingStatus::ContextRetrieved => "context_retrieved",
            ProcessingStatus::ContextRetrievalError => "context_retrieval_error",
            ProcessingStatus::PromptCreated => "prompt_created",
            ProcessingStatus::PromptCreationError => "prompt_creation_error",
            ProcessingStatus::ResponseGenerated => "response_generated",
            ProcessingStatus::ResponseGenerationError => "response_generation_error",
            ProcessingStatus::SavedToHistory => "saved_to_history",
            ProcessingStatus::HistorySavingError => "history_saving_error",
            ProcessingStatus::Completed => "completed",
        }
    }

    /// Tags that doom the request even when later steps still run.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ProcessingStatus::ValidationFailed
                | ProcessingStatus::ValidationError
                | ProcessingStatus::PromptCreationError
                | ProcessingStatus::ResponseGenerationError
        )
    }
}

/// One query against one namespace within one chat.
#[derive(Clone, Debug)]
pub struct QueryRequest {
    pub chat_id: String,
    pub namespace: String,
    pub query: String,
    /// How many chunks to retrieve; zero or unset means the configured default.
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn new(
        chat_id: impl Into<String>,
        namespace: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            namespace: namespace.into(),
            query: query.into(),
            top_k: None,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// Result record handed back to the API caller.
#[derive(Clone, Debug, Serialize)]
pub struct QueryReport {
    pub chat_id: String,
    pub namespace: String,
    pub user_query: String,
    pub answer: String,
    pub success: bool,
    /// `"success"` or `"error"`, mirroring `success`.
    pub status: &'static str,
    /// Tag of the last step that ran before finalization.
    pub processing_status: ProcessingStatus,
    /// Every step tag in execution order, ending with `completed`.
    pub status_trail: Vec<ProcessingStatus>,
    pub error_message: Option<String>,
}

/// Pipeline state threaded through the steps.
struct QueryState {
    chat_id: String,
    namespace: String,
    user_query: String,
    top_k: usize,
    formatted_history: Option<String>,
    context: Option<String>,
    enhanced_prompt: Option<String>,
    answer: Option<String>,
    trail: Vec<ProcessingStatus>,
    error_message: Option<String>,
}

impl QueryState {
    fn push(&mut self, status: ProcessingStatus) {
        self.trail.push(status);
    }
}

impl From<QueryRequest> for QueryState {
    fn from(request: QueryRequest) -> Self {
        Self {
            chat_id: request.chat_id,
            namespace: request.namespace,
            user_query: request.query,
            top_k: request.top_k.unwrap_or(0),
            formatted_history: None,
            context: None,
            enhanced_prompt: None,
            answer: None,
            trail: Vec::new(),
            error_message: None,
        }
    }
}

/// Validate, retrieve, prompt, generate, persist, finalize.
pub struct QueryPipeline {
    log: Arc<dyn ConversationLog>,
    assembler: ContextAssembler,
    completions: Arc<dyn CompletionProvider>,
    history_window: usize,
    history_format_cap: usize,
    default_top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        completions: Arc<dyn CompletionProvider>,
        log: Arc<dyn ConversationLog>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            log,
            assembler: ContextAssembler::new(index, embeddings),
            completions,
            history_window: config.history_window,
            history_format_cap: config.history_format_cap,
            default_top_k: config.default_top_k,
        }
    }

    /// Run one query to completion. Never fails: every step converts its
    /// errors into state the finalizer folds into the report.
    ///
    /// Assumes at most one in-flight request per `chat_id`; concurrent
    /// requests for the same chat append history in unspecified order.
    #[instrument(skip(self, request), fields(chat_id = %request.chat_id, namespace = %request.namespace))]
    pub async fn run(&self, request: QueryRequest) -> QueryReport {
        let mut state = QueryState::from(request);

        if self.validate(&mut state) {
            self.retrieve_history(&mut state).await;
            self.retrieve_context(&mut state).await;
            if self.create_prompt(&mut state) {
                self.generate(&mut state).await;
                if state.answer.is_some() {
                    self.save_history(&mut state).await;
                }
            }
        }
        self.finalize(state)
    }

    /// Reject missing inputs before any backend is touched.
    fn validate(&self, state: &mut QueryState) -> bool {
        if state.chat_id.is_empty() {
            state.error_message = Some("Chat ID is required".to_string());
            state.push(ProcessingStatus::ValidationFailed);
            return false;
        }
        if state.namespace.is_empty() {
            state.error_message = Some("Namespace is required".to_string());
            state.push(ProcessingStatus::ValidationFailed);
            return false;
        }
        if state.user_query.is_empty() {
            state.error_message = Some("User query is required".to_string());
            state.push(ProcessingStatus::ValidationFailed);
            return false;
        }
        if state.top_k == 0 {
            state.top_k = self.default_top_k;
        }
        state.push(ProcessingStatus::InputsValidated);
        true
    }

    async fn retrieve_history(&self, state: &mut QueryState) {
        match self.log.last_n(&state.chat_id, self.history_window).await {
            Ok(sessions) => {
                state.formatted_history =
                    Some(format_history(&sessions, self.history_format_cap));
                state.push(ProcessingStatus::HistoryRetrieved);
            }
            Err(err) => {
                warn!(error = %err, "history retrieval failed, continuing without");
                state.error_message = Some(format!("Chat history retrieval error: {err}"));
                state.formatted_history = Some(NO_HISTORY_AVAILABLE.to_string());
                state.push(ProcessingStatus::HistoryRetrievalError);
            }
        }
    }

    async fn retrieve_context(&self, state: &mut QueryState) {
        let namespaces = std::slice::from_ref(&state.namespace);
        match self
            .assembler
            .assemble(&state.user_query, namespaces, state.top_k)
            .await
        {
            Ok(context) => {
                state.context = Some(context);
                state.push(ProcessingStatus::ContextRetrieved);
            }
            Err(err) => {
                warn!(error = %err, "context retrieval failed, continuing with placeholder");
                state.error_message = Some(format!("Context retrieval error: {err}"));
                state.context = Some(NO_CONTEXT.to_string());
                state.push(ProcessingStatus::ContextRetrievalError);
            }
        }
    }

    fn create_prompt(&self, state: &mut QueryState) -> bool {
        match prompts::enhanced_prompt(
            state.formatted_history.as_deref(),
            state.context.as_deref(),
            &state.user_query,
        ) {
            Ok(prompt) => {
                state.enhanced_prompt = Some(prompt);
                state.push(ProcessingStatus::PromptCreated);
                true
            }
            Err(err) => {
                error!(error = %err, "prompt creation failed");
                state.error_message = Some(format!("Prompt creation error: {err}"));
                state.push(ProcessingStatus::PromptCreationError);
                false
            }
        }
    }

    async fn generate(&self, state: &mut QueryState) {
        let prompt = state.enhanced_prompt.as_deref().unwrap_or_default();
        match complete_with_retry(self.completions.as_ref(), prompt).await {
            Ok(answer) => {
                state.answer = Some(answer);
                state.push(ProcessingStatus::ResponseGenerated);
            }
            Err(err) => {
                warn!(error = %err, "generation failed, substituting apology");
                state.error_message = Some(format!("Response generation error: {err}"));
                state.answer = Some(GENERATION_APOLOGY.to_string());
                state.push(ProcessingStatus::ResponseGenerationError);
            }
        }
    }

    async fn save_history(&self, state: &mut QueryState) {
        let turn = ConversationTurn::new(
            state.user_query.clone(),
            state.answer.clone().unwrap_or_default(),
        );
        match self.log.append(&state.chat_id, turn).await {
            Ok(()) => state.push(ProcessingStatus::SavedToHistory),
            Err(err) => {
                warn!(error = %err, "history save failed");
                state.error_message = Some(format!("History saving error: {err}"));
                state.push(ProcessingStatus::HistorySavingError);
            }
        }
    }

    fn finalize(&self, mut state: QueryState) -> QueryReport {
        let success =
            !state.trail.iter().any(|status| status.is_fatal()) && state.answer.is_some();
        let processing_status = state
            .trail
            .last()
            .copied()
            .unwrap_or(ProcessingStatus::Completed);
        state.push(ProcessingStatus::Completed);

        QueryReport {
            chat_id: state.chat_id,
            namespace: state.namespace,
            user_query: state.user_query,
            answer: state.answer.unwrap_or_else(|| NO_RESPONSE.to_string()),
            success,
            status: if success { "success" } else { "error" },
            processing_status,
            status_trail: state.trail,
            error_message: state.error_message,
        }
    }
}
