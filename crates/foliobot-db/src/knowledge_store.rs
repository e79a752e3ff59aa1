use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foliobot_common::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::codec::{blob_to_embedding, embedding_to_blob, now_timestamp, parse_timestamp, row_error};
use crate::migrations::{KNOWLEDGE_MIGRATIONS, apply_migrations};

/// A seeded fact about the site owner together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub category: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for new knowledge before persistence assigns ID/timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKnowledgeItem {
    pub content: String,
    pub embedding: Vec<f32>,
    pub category: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Every stored item, in insertion order. Rows whose embedding does not
    /// match its recorded dimensionality are left out.
    async fn list_all(&self) -> Result<Vec<KnowledgeItem>>;

    /// Insert unconditionally, returning the new item's id.
    async fn insert(&self, item: NewKnowledgeItem) -> Result<String>;

    /// Insert unless an item with identical content exists. Returns `true` on insert.
    async fn insert_if_absent(&self, item: NewKnowledgeItem) -> Result<bool>;

    async fn count(&self) -> Result<usize>;
}

pub struct SqliteKnowledgeStore {
    conn: Mutex<Connection>,
}

impl SqliteKnowledgeStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening knowledge store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Store(format!("failed to open knowledge database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
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

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.connection()?;
        apply_migrations(&conn, KNOWLEDGE_MIGRATIONS)?;
        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("knowledge database lock poisoned".into()))
    }
}

fn insert_item(conn: &Connection, item: &NewKnowledgeItem) -> Result<String> {
    if item.content.trim().is_empty() {
        return Err(Error::Store("knowledge content cannot be empty".into()));
    }
    if item.embedding.is_empty() {
        return Err(Error::Store("knowledge embedding cannot be empty".into()));
    }

    let id = Uuid::new_v4().to_string();
    let metadata_json = item
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Store(format!("failed to serialize knowledge metadata: {e}")))?;

    conn.execute(
        "INSERT INTO knowledge_base (
            id, content, embedding, embedding_dimensions, category, metadata, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            item.content,
            embedding_to_blob(&item.embedding),
            item.embedding.len() as i64,
            item.category,
            metadata_json,
            now_timestamp(),
        ],
    )
    .map_err(|e| Error::Store(format!("failed to insert knowledge item: {e}")))?;

    Ok(id)
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn list_all(&self) -> Result<Vec<KnowledgeItem>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, content, embedding, category, metadata, created_at
                 FROM knowledge_base
                 WHERE length(embedding) = embedding_dimensions * 4
                 ORDER BY rowid ASC",
            )
            .map_err(|e| Error::Store(format!("failed to prepare knowledge query: {e}")))?;

        let rows = stmt
            .query_map([], row_to_item)
            .map_err(|e| Error::Store(format!("failed to execute knowledge query: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Store(format!("failed to collect knowledge rows: {e}")))
    }

    async fn insert(&self, item: NewKnowledgeItem) -> Result<String> {
        let conn = self.connection()?;
        insert_item(&conn, &item)
    }

    async fn insert_if_absent(&self, item: NewKnowledgeItem) -> Result<bool> {
        let conn = self.connection()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM knowledge_base WHERE content = ?",
                params![item.content],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Store(format!("failed to look up knowledge item: {e}")))?;

        if existing.is_some() {
            debug!("knowledge item already present, skipping");
            return Ok(false);
        }

        insert_item(&conn, &item)?;
        Ok(true)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row("SELECT count(*) FROM knowledge_base", [], |row| row.get(0))
            .map_err(|e| Error::Store(format!("failed to count knowledge items: {e}")))?;
        Ok(count as usize)
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeItem> {
    let embedding_blob: Vec<u8> = row.get(2)?;
    let embedding = blob_to_embedding(&embedding_blob).map_err(row_error)?;

    let metadata_str: Option<String> = row.get(4)?;
    let metadata = metadata_str.and_then(|s| serde_json::from_str(&s).ok());

    let created_at_str: String = row.get(5)?;
    let created_at = parse_timestamp(&created_at_str).map_err(row_error)?;

    Ok(KnowledgeItem {
        id: row.get(0)?,
        content: row.get(1)?,
        embedding,
        category: row.get(3)?,
        metadata,
        created_at,
    })
}
