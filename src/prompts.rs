//! Prompt templates for routing, answering, and summarizing.
//!
//! Wording is pinned: the router's JSON contract, the placeholder strings,
//! and the section headers are all load-bearing for parsing and for tests.

use miette::Diagnostic;
use thiserror::Error;

use crate::history::NO_HISTORY;

/// Default context block when the pipeline state carries none.
const NO_CONTEXT_AVAILABLE: &str = "No relevant context available.";

/// User-facing reply when answer generation itself fails.
pub const GENERATION_APOLOGY: &str =
    "Sorry, I encountered an error while processing your query. Please try again.";

/// Errors from prompt rendering.
#[derive(Debug, Error, Diagnostic)]
pub enum PromptError {
    /// A field the template needs was absent from the pipeline state.
    #[error("prompt input missing: {field}")]
    #[diagnostic(
        code(ragloom::prompts::missing_input),
        help("this state field should have been populated by an earlier step")
    )]
    MissingInput { field: &'static str },
}

/// Classification prompt for the routing agent.
///
/// The model must answer with nothing but `{"route": "<agent_key>"}`; anything
/// else is treated as a routing failure and falls back to `master`.
pub fn router_prompt(question: &str, memory: &str) -> String {
    let memory_block = if memory.trim().is_empty() {
        String::new()
    } else {
        format!("Recent conversation memory:\n{memory}\n\n")
    };
    format!(
        r#"You are a router that selects the best agent to handle a user query.
DO NOT GIVE ANY OTHER EXPLANATION OR OUTPUT JUST VALID JSON.
Your output must be a valid JSON object with this format:
{{"route": "<agent_key>"}}

Valid options:
- qa: For questions related to the uploaded document
- master: For general-purpose questions
- summarize: For requests to summarize the uploaded document

Valid agent_key values are: "qa", "master", "summarize"

{memory_block}User Question: "{question}""#
    )
}

/// Document question-answering prompt combining memory, context, and question.
pub fn qa_prompt(memory: &str, context: &str, question: &str) -> String {
    format!(
        "Conversation History:\n{memory}\n\nDocument Context:\n{context}\n\nQuestion: {question}\nAnswer:"
    )
}

/// General-assistant prompt; no document context involved.
pub fn master_prompt(question: &str) -> String {
    format!("You are a helpful general AI assistant.\nAnswer the following question:\n{question}")
}

/// Whole-document summarization prompt.
pub fn summary_prompt(document_text: &str) -> String {
    format!("Summarize the following document:\n\n{document_text}")
}

/// The enhanced prompt used by the linear query pipeline.
///
/// Missing history or context fall back to fixed placeholder blocks; a
/// missing question is a hard error because nothing upstream can supply one.
pub fn enhanced_prompt(
    history: Option<&str>,
    context: Option<&str>,
    question: &str,
) -> Result<String, PromptError> {
    if question.trim().is_empty() {
        return Err(PromptError::MissingInput { field: "question" });
    }
    let history = history.unwrap_or(NO_HISTORY);
    let context = context.unwrap_or(NO_CONTEXT_AVAILABLE);

    Ok(format!(
        r#"You are an AI assistant that answers questions based on the provided context and conversation history.
Use the following information to provide a comprehensive and contextual answer.

Previous Conversation History:
{history}

Relevant Context from Documents:
{context}

Current Question: {question}

Instructions:
1. Use the conversation history to understand the context of the current question
2. Refer to the document context to provide accurate information
3. If the question relates to previous conversations, acknowledge that connection
4. If you don't know the answer based on the provided context, say so clearly
5. Be conversational and maintain continuity with the chat history
6. Provide detailed explanations when appropriate

Answer:"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_prompt_pins_json_contract() {
        let prompt = router_prompt("What is attention?", "");
        assert!(prompt.contains(r#"{"route": "<agent_key>"}"#));
        assert!(prompt.contains(r#""qa", "master", "summarize""#));
        assert!(prompt.contains(r#"User Question: "What is attention?""#));
        assert!(!prompt.contains("Recent conversation memory:"));
    }

    #[test]
    fn router_prompt_includes_memory_when_present() {
        let prompt = router_prompt("next?", "question: hi\nanswer: hello");
        assert!(prompt.contains("Recent conversation memory:\nquestion: hi\nanswer: hello"));
    }

    #[test]
    fn qa_prompt_section_order() {
        let prompt = qa_prompt("the memory", "the context", "the question");
        assert_eq!(
            prompt,
            "Conversation History:\nthe memory\n\nDocument Context:\nthe context\n\nQuestion: the question\nAnswer:"
        );
    }

    #[test]
    fn enhanced_prompt_renders_sections_and_instructions() {
        let prompt = enhanced_prompt(Some("User: hi\nAssistant: hello"), Some("chunk text"), "why?")
            .unwrap();
        assert!(prompt.contains("Previous Conversation History:\nUser: hi\nAssistant: hello"));
        assert!(prompt.contains("Relevant Context from Documents:\nchunk text"));
        assert!(prompt.contains("Current Question: why?"));
        assert!(prompt.contains("6. Provide detailed explanations when appropriate"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn enhanced_prompt_defaults_missing_blocks() {
        let prompt = enhanced_prompt(None, None, "why?").unwrap();
        assert!(prompt.contains("No previous conversation history."));
        assert!(prompt.contains("No relevant context available."));
    }

    #[test]
    fn enhanced_prompt_rejects_empty_question() {
        let err = enhanced_prompt(None, None, "  ").unwrap_err();
        assert!(matches!(err, PromptError::MissingInput { field: "question" }));
    }
}
