//! Question routing over a closed agent set.
//!
//! One completion call classifies the question into `qa`, `master`, or
//! `summarize`. The classifier is deliberately infallible from the caller's
//! point of view: malformed output, unknown keys, and backend failures all
//! resolve to [`Route::Master`] so a routing hiccup never blocks an answer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::prompts;
use crate::providers::CompletionProvider;

/// Which agent handles a question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Qa,
    Master,
    Summarize,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Qa => "qa",
            Route::Master => "master",
            Route::Summarize => "summarize",
        }
    }

    /// Parse an agent key from classifier output.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "qa" => Some(Route::Qa),
            "master" => Some(Route::Master),
            "summarize" => Some(Route::Summarize),
            _ => None,
        }
    }
}

/// A resolved route plus the diagnostics behind it.
#[derive(Clone, Debug)]
pub struct RouteDecision {
    pub route: Route,
    /// Raw classifier output, kept to debug drift in model behavior.
    pub raw_response: Option<String>,
    /// True when the route came from the master fallback instead of a
    /// cleanly parsed key.
    pub fallback: bool,
}

/// LLM-backed classifier over the closed route set.
pub struct RouteClassifier {
    completions: Arc<dyn CompletionProvider>,
}

impl RouteClassifier {
    pub fn new(completions: Arc<dyn CompletionProvider>) -> Self {
        Self { completions }
    }

    /// Classify a question given whatever conversational memory was recalled.
    #[instrument(skip(self, question, memory))]
    pub async fn classify(&self, question: &str, memory: &str) -> RouteDecision {
        let prompt = prompts::router_prompt(question, memory);
        let raw = match self.completions.complete(&prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "router call failed, falling back to master");
                return RouteDecision {
                    route: Route::Master,
                    raw_response: None,
                    fallback: true,
                };
            }
        };

        let parsed = parse_route(&raw);
        let route = parsed.unwrap_or(Route::Master);
        debug!(raw = %raw.trim(), resolved = route.as_str(), "router output");
        RouteDecision {
            route,
            raw_response: Some(raw),
            fallback: parsed.is_none(),
        }
    }
}

#[derive(Deserialize)]
struct RouteEnvelope {
    route: Option<String>,
}

fn parse_route(raw: &str) -> Option<Route> {
    let envelope: RouteEnvelope = serde_json::from_str(raw.trim()).ok()?;
    Route::from_key(envelope.route.as_deref()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockCompletions;

    #[test]
    fn parse_route_accepts_each_valid_key() {
        assert_eq!(parse_route(r#"{"route": "qa"}"#), Some(Route::Qa));
        assert_eq!(parse_route(r#"{"route": "master"}"#), Some(Route::Master));
        assert_eq!(
            parse_route(r#" {"route": "summarize"} "#),
            Some(Route::Summarize)
        );
    }

    #[test]
    fn parse_route_rejects_garbage_and_unknown_keys() {
        assert_eq!(parse_route("qa"), None);
        assert_eq!(parse_route(r#"{"route": "banana"}"#), None);
        assert_eq!(parse_route(r#"{"agent": "qa"}"#), None);
        assert_eq!(parse_route(""), None);
    }

    #[tokio::test]
    async fn classify_resolves_clean_output() {
        let completions = Arc::new(MockCompletions::answering(r#"{"route": "summarize"}"#));
        let classifier = RouteClassifier::new(completions);

        let decision = classifier.classify("sum it up", "").await;
        assert_eq!(decision.route, Route::Summarize);
        assert!(!decision.fallback);
        assert!(decision.raw_response.is_some());
    }

    #[tokio::test]
    async fn malformed_output_falls_back_to_master() {
        let completions = Arc::new(MockCompletions::answering("definitely not json"));
        let classifier = RouteClassifier::new(completions);

        let decision = classifier.classify("hello", "").await;
        assert_eq!(decision.route, Route::Master);
        assert!(decision.fallback);
        assert_eq!(decision.raw_response.as_deref(), Some("definitely not json"));
    }

    #[tokio::test]
    async fn backend_failure_falls_back_to_master() {
        let completions = Arc::new(MockCompletions::failing());
        let classifier = RouteClassifier::new(completions);

        let decision = classifier.classify("hello", "").await;
        assert_eq!(decision.route, Route::Master);
        assert!(decision.fallback);
        assert!(decision.raw_response.is_none());
    }

    #[tokio::test]
    async fn classifier_prompt_carries_memory() {
        let completions = Arc::new(MockCompletions::answering(r#"{"route": "qa"}"#));
        let classifier = RouteClassifier::new(completions.clone());

        classifier.classify("next?", "question: hi\nanswer: hello").await;
        let calls = completions.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("Recent conversation memory:"));
    }
}
