use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foliobot_common::{Error, Result, SessionId};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::codec::{blob_to_embedding, embedding_to_blob, now_timestamp, parse_timestamp, row_error};
use crate::migrations::{CONVERSATION_MIGRATIONS, apply_migrations};

const MAX_LIST_LIMIT: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: SessionId,
    pub user_ip: Option<String>,
    pub user_agent: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// One persisted exchange: the visitor's message and the bot's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: SessionId,
    pub user_message: String,
    pub bot_reply: String,
    pub embedding: Option<Vec<f32>>,
    pub context_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChatMessage {
    pub session_id: SessionId,
    pub user_message: String,
    pub bot_reply: String,
    pub embedding: Option<Vec<f32>>,
    pub context_used: Option<String>,
}

#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// Return `session_id` when it names a known session, otherwise create a new one.
    async fn get_or_create_session(
        &self,
        session_id: Option<&SessionId>,
        user_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<SessionId>;

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<ChatSession>>;

    async fn end_session(&self, session_id: &SessionId) -> Result<()>;

    async fn insert(&self, message: NewChatMessage) -> Result<String>;

    /// Most recent exchanges across all sessions, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<ChatMessage>>;

    /// Like `list_recent`, restricted to exchanges that carry an embedding
    /// consistent with its recorded dimensionality.
    async fn list_recent_embedded(&self, limit: usize) -> Result<Vec<ChatMessage>>;

    /// Every exchange of one session, oldest first.
    async fn session_messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>>;
}

pub struct SqliteConversationLog {
    conn: Mutex<Connection>,
}

impl SqliteConversationLog {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening conversation log at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Store(format!("failed to open conversation database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Store(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Store(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Store(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.connection()?;
        apply_migrations(&conn, CONVERSATION_MIGRATIONS)?;
        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("conversation database lock poisoned".into()))
    }

    fn query_messages(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ChatMessage>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::Store(format!("failed to prepare message query: {e}")))?;

        let rows = stmt
            .query_map(params, row_to_message)
            .map_err(|e| Error::Store(format!("failed to execute message query: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Store(format!("failed to collect message rows: {e}")))
    }
}

#[async_trait]
impl ConversationLog for SqliteConversationLog {
    async fn get_or_create_session(
        &self,
        session_id: Option<&SessionId>,
        user_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<SessionId> {
        let conn = self.connection()?;

        if let Some(id) = session_id {
            let known: Option<String> = conn
                .query_row(
                    "SELECT session_id FROM chat_sessions WHERE session_id = ?",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| Error::Store(format!("failed to look up session: {e}")))?;

            if known.is_some() {
                return Ok(id.clone());
            }
            debug!("unknown session id {id}, creating a new session");
        }

        let new_id = SessionId::new();
        conn.execute(
            "INSERT INTO chat_sessions (session_id, user_ip, user_agent, started_at)
             VALUES (?, ?, ?, ?)",
            params![new_id.as_str(), user_ip, user_agent, now_timestamp()],
        )
        .map_err(|e| Error::Store(format!("failed to create session: {e}")))?;

        info!("created chat session {new_id}");
        Ok(new_id)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<ChatSession>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT session_id, user_ip, user_agent, started_at, ended_at
             FROM chat_sessions WHERE session_id = ?",
            params![session_id.as_str()],
            row_to_session,
        )
        .optional()
        .map_err(|e| Error::Store(format!("failed to load session: {e}")))
    }

    async fn end_session(&self, session_id: &SessionId) -> Result<()> {
        let conn = self.connection()?;
        let updated = conn
            .execute(
                "UPDATE chat_sessions SET ended_at = ? WHERE session_id = ?",
                params![now_timestamp(), session_id.as_str()],
            )
            .map_err(|e| Error::Store(format!("failed to end session: {e}")))?;

        if updated == 0 {
            return Err(Error::NotFound(format!("session {session_id}")));
        }
        Ok(())
    }

    async fn insert(&self, message: NewChatMessage) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let embedding_blob = message.embedding.as_deref().map(embedding_to_blob);
        let embedding_dimensions = message.embedding.as_ref().map(|e| e.len() as i64);

        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO chat_messages (
                id, session_id, user_message, bot_reply, embedding,
                embedding_dimensions, context_used, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                message.session_id.as_str(),
                message.user_message,
                message.bot_reply,
                embedding_blob,
                embedding_dimensions,
                message.context_used,
                now_timestamp(),
            ],
        )
        .map_err(|e| Error::Store(format!("failed to insert chat message: {e}")))?;

        Ok(id)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ChatMessage>> {
        self.query_messages(
            "SELECT id, session_id, user_message, bot_reply, embedding, context_used, created_at
             FROM chat_messages
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
            params![limit.min(MAX_LIST_LIMIT) as i64],
        )
    }

    async fn list_recent_embedded(&self, limit: usize) -> Result<Vec<ChatMessage>> {
        self.query_messages(
            "SELECT id, session_id, user_message, bot_reply, embedding, context_used, created_at
             FROM chat_messages
             WHERE embedding IS NOT NULL
               AND length(embedding) = embedding_dimensions * 4
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
            params![limit.min(MAX_LIST_LIMIT) as i64],
        )
    }

    async fn session_messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>> {
        self.query_messages(
            "SELECT id, session_id, user_message, bot_reply, embedding, context_used, created_at
             FROM chat_messages
             WHERE session_id = ?
             ORDER BY created_at ASC, rowid ASC",
            params![session_id.as_str()],
        )
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatSession> {
    let started_at_str: String = row.get(3)?;
    let started_at = parse_timestamp(&started_at_str).map_err(row_error)?;

    let ended_at_str: Option<String> = row.get(4)?;
    let ended_at = ended_at_str
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(row_error)?;

    Ok(ChatSession {
        session_id: SessionId::from_str(row.get::<_, String>(0)?),
        user_ip: row.get(1)?,
        user_agent: row.get(2)?,
        started_at,
        ended_at,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let embedding_blob: Option<Vec<u8>> = row.get(4)?;
    let embedding = embedding_blob
        .as_deref()
        .map(blob_to_embedding)
        .transpose()
        .map_err(row_error)?;

    let created_at_str: String = row.get(6)?;
    let created_at = parse_timestamp(&created_at_str).map_err(row_error)?;

    Ok(ChatMessage {
        id: row.get(0)?,
        session_id: SessionId::from_str(row.get::<_, String>(1)?),
        user_message: row.get(2)?,
        bot_reply: row.get(3)?,
        embedding,
        context_used: row.get(5)?,
        created_at,
    })
}
