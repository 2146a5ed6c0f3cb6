//! Per-session conversation history.
//!
//! History is only read by the orchestrator and written once per completed
//! request, so stores only need ordered append and tail reads.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::ChatError;
use crate::types::{Role, Turn};

/// Ordered message log keyed by session id.
pub trait ConversationStore: Send + Sync {
    /// The newest `limit` turns of a session, oldest first.
    fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, ChatError>;

    /// The most recent user message of a session.
    fn last_user_message(&self, session_id: &str) -> Result<Option<String>, ChatError>;

    /// Record one exchange.
    fn append(&self, session_id: &str, user: &str, assistant: &str) -> Result<(), ChatError>;

    /// Drop a session's history, returning the number of messages removed.
    fn clear(&self, session_id: &str) -> Result<usize, ChatError>;
}

/// Process-local store; history is lost on restart.
pub struct InMemoryConversationStore {
    sessions: Mutex<HashMap<String, Vec<Turn>>>,
    max_messages: usize,
}

impl InMemoryConversationStore {
    /// Keeps at most `max_messages` per session, discarding the oldest.
    pub fn new(max_messages: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_messages: max_messages.max(2),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<Turn>>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::Conversation(format!("Lock poisoned: {}", e)))
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(200)
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, ChatError> {
        let sessions = self.lock()?;
        Ok(sessions
            .get(session_id)
            .map(|turns| {
                let start = turns.len().saturating_sub(limit);
                turns[start..].to_vec()
            })
            .unwrap_or_default())
    }

    fn last_user_message(&self, session_id: &str) -> Result<Option<String>, ChatError> {
        let sessions = self.lock()?;
        Ok(sessions.get(session_id).and_then(|turns| {
            turns
                .iter()
                .rev()
                .find(|t| t.role == Role::User)
                .map(|t| t.content.clone())
        }))
    }

    fn append(&self, session_id: &str, user: &str, assistant: &str) -> Result<(), ChatError> {
        let mut sessions = self.lock()?;
        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push(Turn::user(user));
        turns.push(Turn::assistant(assistant));
        if turns.len() > self.max_messages {
            let excess = turns.len() - self.max_messages;
            turns.drain(..excess);
        }
        Ok(())
    }

    fn clear(&self, session_id: &str) -> Result<usize, ChatError> {
        Ok(self
            .lock()?
            .remove(session_id)
            .map(|t| t.len())
            .unwrap_or(0))
    }
}

/// SQLite-backed store.
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    /// Open (or create) the database at `path` and apply migrations.
    pub fn open(path: &Path) -> Result<Self, ChatError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChatError::Conversation(format!("Failed to create directory: {}", e)))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ChatError::Conversation(format!("Failed to open database: {}", e)))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| ChatError::Conversation(format!("Failed to set pragmas: {}", e)))?;

        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "Conversation store opened");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, ChatError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ChatError::Conversation(format!("Failed to open in-memory db: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, ChatError> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, ChatError>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ChatError::Conversation(format!("Lock poisoned: {}", e)))?;
        f(&mut conn).map_err(|e| ChatError::Conversation(e.to_string()))
    }
}

fn run_migrations(conn: &Connection) -> Result<(), ChatError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ChatError::Conversation(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ChatError::Conversation(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        conn.execute_batch(
            "BEGIN;
             CREATE TABLE IF NOT EXISTS messages (
                 id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 session_id  TEXT NOT NULL,
                 role        TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
                 content     TEXT NOT NULL,
                 created_at  INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, id);
             INSERT INTO schema_migrations (version, name) VALUES (1, 'messages');
             COMMIT;",
        )
        .map_err(|e| ChatError::Conversation(format!("Failed to apply migration v1: {}", e)))?;
        info!("Applied conversation migration v1: messages");
    }
    Ok(())
}

impl ConversationStore for SqliteConversationStore {
    fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, ChatError> {
        let rows: Vec<(String, String)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT role, content FROM messages
                 WHERE session_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![session_id, limit as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut turns = rows
            .into_iter()
            .map(|(role, content)| {
                let role = role.parse::<Role>().map_err(ChatError::Conversation)?;
                Ok(Turn { role, content })
            })
            .collect::<Result<Vec<_>, ChatError>>()?;
        turns.reverse();
        Ok(turns)
    }

    fn last_user_message(&self, session_id: &str) -> Result<Option<String>, ChatError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT content FROM messages
                 WHERE session_id = ?1 AND role = 'user'
                 ORDER BY id DESC
                 LIMIT 1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    fn append(&self, session_id: &str, user: &str, assistant: &str) -> Result<(), ChatError> {
        let now = Utc::now().timestamp();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO messages (session_id, role, content, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                stmt.execute(params![session_id, Role::User.as_str(), user, now])?;
                stmt.execute(params![session_id, Role::Assistant.as_str(), assistant, now])?;
            }
            tx.commit()
        })
    }

    fn clear(&self, session_id: &str) -> Result<usize, ChatError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM messages WHERE session_id = ?1", params![session_id])
        })
    }
}
