//! SQLite-backed [`MemoryStore`].
//!
//! Memories are short facts. Search scores each stored fact by how many
//! distinct query words it contains; ties go to the newer fact.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use tracing::info;

use crate::collaborators::{MemoryItem, MemoryStore};
use crate::error::ServiceError;
use crate::vault::query_terms;

pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
}

impl SqliteMemoryStore {
    pub fn open(path: &Path) -> Result<Self, ServiceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ServiceError(format!("Failed to create directory: {}", e)))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ServiceError(format!("Failed to open memory database: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| ServiceError(format!("Failed to set pragmas: {}", e)))?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "Memory store opened");
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, ServiceError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ServiceError(format!("Failed to open in-memory db: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, ServiceError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                 id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 content     TEXT NOT NULL,
                 created_at  INTEGER NOT NULL
             );",
        )
        .map_err(|e| ServiceError(format!("Failed to create memories table: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ServiceError(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| ServiceError(e.to_string()))
    }

    /// Newest first, at most `limit` rows (`None` for all).
    fn rows(&self, limit: Option<usize>) -> Result<Vec<MemoryItem>, ServiceError> {
        let limit = limit.map_or(-1, |l| l as i64);
        let rows: Vec<(i64, String, i64)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, created_at FROM memories ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        Ok(rows
            .into_iter()
            .map(|(id, content, ts)| MemoryItem {
                id,
                content,
                created_at: from_timestamp(ts),
            })
            .collect())
    }
}

fn from_timestamp(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

impl MemoryStore for SqliteMemoryStore {
    fn save(&self, content: &str, now: DateTime<Utc>) -> Result<MemoryItem, ServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError("Nothing to remember".to_string()));
        }
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO memories (content, created_at) VALUES (?1, ?2)",
                params![content, now.timestamp()],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        info!(memory_id = id, "Memory saved");
        Ok(MemoryItem {
            id,
            content: content.to_string(),
            created_at: from_timestamp(now.timestamp()),
        })
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<MemoryItem>, ServiceError> {
        let terms = query_terms(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        // Newest first, so a stable sort keeps recency as the tie-breaker.
        let mut scored: Vec<(usize, MemoryItem)> = self
            .rows(None)?
            .into_iter()
            .filter_map(|item| {
                let text = item.content.to_lowercase();
                let score = terms.iter().filter(|t| text.contains(t.as_str())).count();
                (score > 0).then_some((score, item))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(limit).map(|(_, item)| item).collect())
    }

    fn list(&self, limit: usize) -> Result<Vec<MemoryItem>, ServiceError> {
        self.rows(Some(limit))
    }

    fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        let removed =
            self.with_conn(|conn| conn.execute("DELETE FROM memories WHERE id = ?1", params![id]))?;
        if removed > 0 {
            info!(memory_id = id, "Memory deleted");
        }
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-10-16T14:00:00Z".parse().unwrap()
    }

    fn store_with(facts: &[&str]) -> SqliteMemoryStore {
        let store = SqliteMemoryStore::in_memory().unwrap();
        for fact in facts {
            store.save(fact, now()).unwrap();
        }
        store
    }

    #[test]
    fn test_save_and_list_newest_first() {
        let store = store_with(&["Sister lives in Porto", "Allergic to peanuts"]);
        let items = store.list(10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content, "Allergic to peanuts");
        assert_eq!(items[0].created_at, now());
        assert_eq!(store.list(1).unwrap().len(), 1);
    }

    #[test]
    fn test_save_rejects_blank() {
        let store = store_with(&[]);
        assert!(store.save("   ", now()).is_err());
    }

    #[test]
    fn test_search_ranks_by_matching_words() {
        let store = store_with(&[
            "Sister lives in Porto",
            "Favourite city is Porto",
            "My sister Ana lives in Porto near the river",
        ]);
        let hits = store.search("where does my sister live in Porto?", 5).unwrap();
        assert_eq!(hits.len(), 3);
        // Both sister facts match three words; the newer one wins the tie.
        assert_eq!(hits[0].content, "My sister Ana lives in Porto near the river");
        assert_eq!(hits[1].content, "Sister lives in Porto");
        assert_eq!(hits[2].content, "Favourite city is Porto");

        assert_eq!(store.search("sister", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_search_ignores_stopwords_and_short_words() {
        let store = store_with(&["The dentist is on Tuesday"]);
        assert!(store.search("what is the", 5).unwrap().is_empty());
        assert_eq!(store.search("dentist", 5).unwrap().len(), 1);
    }

    #[test]
    fn test_delete() {
        let store = store_with(&["Parks on level 2"]);
        let id = store.list(1).unwrap()[0].id;
        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());
        assert!(store.list(10).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_keeps_memories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memories.db");
        SqliteMemoryStore::open(&path)
            .unwrap()
            .save("Bike lock code is 4512", now())
            .unwrap();
        let reopened = SqliteMemoryStore::open(&path).unwrap();
        assert_eq!(reopened.search("lock code", 5).unwrap().len(), 1);
    }
}
