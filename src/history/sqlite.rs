//! SQLite-backed conversation log.
//!
//! Two tables: `sessions` keyed by chat, `turns` keyed by session. Session
//! recency is resolved by creation timestamp with rowid as tiebreak, so two
//! sessions opened within the same instant still order deterministically.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::{Connection, OptionalExtension};

use super::{ConversationLog, ConversationTurn, HistoryError};

/// Conversation log persisted in a SQLite database.
#[derive(Clone)]
pub struct SqliteConversationLog {
    conn: Connection,
}

impl SqliteConversationLog {
    /// Open (or create) the log at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let conn = Connection::open(path)
            .await
            .map_err(|err| HistoryError::Storage(err.to_string()))?;
        Self::finish_open(conn).await
    }

    /// Open a throwaway in-memory log, mainly for tests.
    pub async fn open_in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| HistoryError::Storage(err.to_string()))?;
        Self::finish_open(conn).await
    }

    async fn finish_open(conn: Connection) -> Result<Self, HistoryError> {
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id TEXT PRIMARY KEY,
                    chat_id TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_sessions_chat ON sessions(chat_id, created_at);
                CREATE TABLE IF NOT EXISTS turns (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL,
                    user_message TEXT NOT NULL,
                    ai_message TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id, id);",
            )
            .map_err(tokio_rusqlite::Error::Error)
        })
        .await
        .map_err(|err| HistoryError::Storage(err.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ConversationLog for SqliteConversationLog {
    async fn start_chat(&self, chat_id: &str) -> Result<(), HistoryError> {
        let chat_id = chat_id.to_string();
        let session_id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (id, chat_id, created_at) VALUES (?1, ?2, ?3)",
                    (&session_id, &chat_id, &created_at),
                )
                .map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error<tokio_rusqlite::Error>| {
                HistoryError::Storage(err.to_string())
            })
    }

    async fn append(&self, chat_id: &str, turn: ConversationTurn) -> Result<(), HistoryError> {
        let chat_id = chat_id.to_string();
        let fresh_session_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let turn_created_at = turn.timestamp.to_rfc3339();

        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Error)?;

                let latest: Option<String> = tx
                    .query_row(
                        "SELECT id FROM sessions WHERE chat_id = ?1 \
                         ORDER BY created_at DESC, rowid DESC LIMIT 1",
                        [&chat_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Error)?;

                let session_id = match latest {
                    Some(id) => id,
                    None => {
                        tx.execute(
                            "INSERT INTO sessions (id, chat_id, created_at) VALUES (?1, ?2, ?3)",
                            (&fresh_session_id, &chat_id, &now),
                        )
                        .map_err(tokio_rusqlite::Error::Error)?;
                        fresh_session_id
                    }
                };

                tx.execute(
                    "INSERT INTO turns (session_id, user_message, ai_message, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    (&session_id, &turn.user, &turn.ai, &turn_created_at),
                )
                .map_err(tokio_rusqlite::Error::Error)?;

                tx.commit().map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error<tokio_rusqlite::Error>| {
                HistoryError::Storage(err.to_string())
            })
    }

    async fn last_n(
        &self,
        chat_id: &str,
        n: usize,
    ) -> Result<Vec<Vec<ConversationTurn>>, HistoryError> {
        let chat_id = chat_id.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT id FROM sessions WHERE chat_id = ?1 \
                         ORDER BY created_at DESC, rowid DESC LIMIT {}",
                        n
                    ))
                    .map_err(tokio_rusqlite::Error::Error)?;
                let rows = stmt
                    .query_map([&chat_id], |row| row.get::<_, String>(0))
                    .map_err(tokio_rusqlite::Error::Error)?;

                let mut session_ids = Vec::new();
                for row in rows {
                    session_ids.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                // Query returned newest first; prompts want oldest first.
                session_ids.reverse();

                let mut sessions = Vec::with_capacity(session_ids.len());
                for session_id in session_ids {
                    let mut stmt = conn
                        .prepare(
                            "SELECT user_message, ai_message, created_at \
                             FROM turns WHERE session_id = ?1 ORDER BY id ASC",
                        )
                        .map_err(tokio_rusqlite::Error::Error)?;
                    let rows = stmt
                        .query_map([&session_id], |row| {
                            let raw: String = row.get(2)?;
                            Ok(ConversationTurn {
                                user: row.get(0)?,
                                ai: row.get(1)?,
                                timestamp: DateTime::parse_from_rfc3339(&raw)
                                    .map(|dt| dt.with_timezone(&Utc))
                                    .unwrap_or_default(),
                            })
                        })
                        .map_err(tokio_rusqlite::Error::Error)?;

                    let mut turns = Vec::new();
                    for row in rows {
                        turns.push(row.map_err(tokio_rusqlite::Error::Error)?);
                    }
                    sessions.push(turns);
                }
                Ok(sessions)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error<tokio_rusqlite::Error>| {
                HistoryError::Storage(err.to_string())
            })
    }
}
