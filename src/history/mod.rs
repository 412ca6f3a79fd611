//! Conversation history storage.
//!
//! A chat is a sequence of sessions; a session is a sequence of turns. Each
//! query appends one [`ConversationTurn`] (user message plus assistant reply)
//! to the latest session of its chat. Retrieval windows over whole sessions,
//! oldest first, so prompts read top to bottom in chronological order.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sqlite::SqliteConversationLog;

/// Placeholder used whenever a chat has no usable history.
pub const NO_HISTORY: &str = "No previous conversation history.";

/// Errors surfaced by conversation log backends.
#[derive(Debug, Error, Diagnostic)]
pub enum HistoryError {
    /// Underlying storage failure (connection, SQL, serialization).
    #[error("history storage error: {0}")]
    #[diagnostic(code(ragloom::history::storage))]
    Storage(String),
}

/// One user/assistant exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user: String,
    pub ai: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(user: impl Into<String>, ai: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ai: ai.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-chat conversation storage.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// Open a fresh session for the chat. Subsequent turns land here.
    async fn start_chat(&self, chat_id: &str) -> Result<(), HistoryError>;

    /// Append a turn to the chat's latest session, creating one if the chat
    /// has never been started.
    async fn append(&self, chat_id: &str, turn: ConversationTurn) -> Result<(), HistoryError>;

    /// The chat's last `n` sessions, oldest first, each with its turns in
    /// order of arrival.
    async fn last_n(
        &self,
        chat_id: &str,
        n: usize,
    ) -> Result<Vec<Vec<ConversationTurn>>, HistoryError>;
}

/// Render history sessions into prompt text.
///
/// Keeps at most the `max_sessions` most recent sessions and renders every
/// turn as a `User:` line followed by an `Assistant:` line.
pub fn format_history(sessions: &[Vec<ConversationTurn>], max_sessions: usize) -> String {
    let start = sessions.len().saturating_sub(max_sessions);
    let mut lines = Vec::new();
    for session in &sessions[start..] {
        for turn in session {
            lines.push(format!("User: {}", turn.user));
            lines.push(format!("Assistant: {}", turn.ai));
        }
    }
    if lines.is_empty() {
        return NO_HISTORY.to_string();
    }
    lines.join("\n")
}

/// Conversation log held entirely in process memory.
pub struct InMemoryConversationLog {
    chats: RwLock<FxHashMap<String, Vec<Vec<ConversationTurn>>>>,
}

impl InMemoryConversationLog {
    pub fn new() -> Self {
        Self {
            chats: RwLock::new(FxHashMap::default()),
        }
    }
}

impl Default for InMemoryConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn start_chat(&self, chat_id: &str) -> Result<(), HistoryError> {
        let mut chats = self.chats.write();
        chats.entry(chat_id.to_string()).or_default().push(Vec::new());
        Ok(())
    }

    async fn append(&self, chat_id: &str, turn: ConversationTurn) -> Result<(), HistoryError> {
        let mut chats = self.chats.write();
        let sessions = chats.entry(chat_id.to_string()).or_default();
        if sessions.is_empty() {
            sessions.push(Vec::new());
        }
        if let Some(latest) = sessions.last_mut() {
            latest.push(turn);
        }
        Ok(())
    }

    async fn last_n(
        &self,
        chat_id: &str,
        n: usize,
    ) -> Result<Vec<Vec<ConversationTurn>>, HistoryError> {
        let chats = self.chats.read();
        let Some(sessions) = chats.get(chat_id) else {
            return Ok(Vec::new());
        };
        let start = sessions.len().saturating_sub(n);
        Ok(sessions[start..].to_vec())
    }
}
