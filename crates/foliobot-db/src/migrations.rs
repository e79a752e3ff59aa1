use foliobot_common::{Error, Result};
use rusqlite::{Connection, params};
use tracing::info;

/// A versioned schema statement applied when a store is opened.
///
/// Applied versions are recorded in a `_migrations` table, so each one runs
/// at most once per database file.
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

pub const KNOWLEDGE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "knowledge_base",
    sql: "CREATE TABLE IF NOT EXISTS knowledge_base (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            embedding_dimensions INTEGER NOT NULL,
            category TEXT,
            metadata TEXT,
            created_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_knowledge_content
            ON knowledge_base(content);",
}];

pub const CONVERSATION_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "chat_sessions_and_messages",
    sql: "CREATE TABLE IF NOT EXISTS chat_sessions (
            session_id TEXT PRIMARY KEY,
            user_ip TEXT,
            user_agent TEXT,
            started_at TEXT NOT NULL,
            ended_at TEXT
        );

        CREATE TABLE IF NOT EXISTS chat_messages (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES chat_sessions(session_id),
            user_message TEXT NOT NULL,
            bot_reply TEXT NOT NULL,
            embedding BLOB,
            embedding_dimensions INTEGER,
            context_used TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_session
            ON chat_messages(session_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_chat_messages_created
            ON chat_messages(created_at);",
}];

/// Apply every migration newer than the database's recorded version, in order.
/// Returns how many were applied.
pub fn apply_migrations(conn: &Connection, migrations: &[Migration]) -> Result<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| Error::Store(format!("failed to create migrations table: {e}")))?;

    let current = schema_version(conn)?;
    let mut applied = 0;
    for migration in migrations.iter().filter(|m| m.version > current) {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::Store(format!("failed to begin migration: {e}")))?;
        tx.execute_batch(migration.sql).map_err(|e| {
            Error::Store(format!("migration {} ({}) failed: {e}", migration.version, migration.name))
        })?;
        tx.execute(
            "INSERT INTO _migrations (version, name) VALUES (?, ?)",
            params![migration.version, migration.name],
        )
        .map_err(|e| Error::Store(format!("failed to record migration: {e}")))?;
        tx.commit()
            .map_err(|e| Error::Store(format!("failed to commit migration: {e}")))?;

        info!("applied migration {} ({})", migration.version, migration.name);
        applied += 1;
    }
    Ok(applied)
}

/// Highest applied migration version, or 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
        row.get(0)
    })
    .map_err(|e| Error::Store(format!("failed to read schema version: {e}")))
}
