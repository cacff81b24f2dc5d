//! SQLite-backed memory store.

use crate::error::MemoryError;
use crate::model::{MemoryEntry, Note};
use crate::store::MemoryStore;
use chrono::Utc;
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memory (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

/// Memory store backed by a single SQLite connection.
pub struct SqliteMemoryStore {
    /// Serializes every statement so reads never observe partial writes.
    conn: Mutex<Connection>,
}

impl SqliteMemoryStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        info!("initialized sqlite memory store (path={})", path.display());
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, MemoryError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl MemoryStore for SqliteMemoryStore {
    fn upsert_memory(&self, key: &str, value: &str) -> Result<MemoryEntry, MemoryError> {
        let updated_at = Utc::now();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO memory (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, updated_at],
        )?;
        debug!(
            "upserted memory (key={}, value_len={})",
            key,
            value.len()
        );
        Ok(MemoryEntry {
            key: key.to_string(),
            value: value.to_string(),
            updated_at,
        })
    }

    fn list_entries(&self) -> Result<Vec<MemoryEntry>, MemoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key, value, updated_at FROM memory ORDER BY key")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(MemoryEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn delete_memory(&self, key: &str) -> Result<bool, MemoryError> {
        let conn = self.conn.lock();
        let existing: Option<String> = conn
            .query_row("SELECT key FROM memory WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        if existing.is_none() {
            return Ok(false);
        }
        conn.execute("DELETE FROM memory WHERE key = ?1", [key])?;
        info!("deleted memory entry (key={})", key);
        Ok(true)
    }

    fn add_note(&self, content: &str) -> Result<Note, MemoryError> {
        let created_at = Utc::now();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO notes (content, created_at) VALUES (?1, ?2)",
            params![content, created_at],
        )?;
        let id = conn.last_insert_rowid();
        debug!("added note (id={}, content_len={})", id, content.len());
        Ok(Note {
            id,
            content: content.to_string(),
            created_at,
        })
    }

    fn list_notes(&self, limit: Option<usize>) -> Result<Vec<Note>, MemoryError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, content, created_at FROM notes ORDER BY id DESC LIMIT ?1")?;
        let notes = stmt
            .query_map([limit], |row| {
                Ok(Note {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteMemoryStore;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn upsert_overwrites_existing_key() {
        let store = SqliteMemoryStore::open_in_memory().expect("store");
        store.upsert_memory("lang", "python").expect("first");
        store.upsert_memory("lang", "rust").expect("second");

        let memory = store.list_memory().expect("list");
        assert_eq!(memory.len(), 1);
        assert_eq!(memory["lang"], "rust");
    }

    #[test]
    fn notes_list_most_recent_first() {
        let store = SqliteMemoryStore::open_in_memory().expect("store");
        let a = store.add_note("a").expect("a");
        let b = store.add_note("b").expect("b");
        assert!(b.id > a.id);

        let contents: Vec<String> = store
            .list_notes(None)
            .expect("notes")
            .into_iter()
            .map(|note| note.content)
            .collect();
        assert_eq!(contents, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn notes_respect_limit() {
        let store = SqliteMemoryStore::open_in_memory().expect("store");
        for idx in 0..7 {
            store.add_note(&format!("note {idx}")).expect("note");
        }
        let notes = store.list_notes(Some(5)).expect("notes");
        assert_eq!(notes.len(), 5);
        assert_eq!(notes[0].content, "note 6");
        assert_eq!(notes[4].content, "note 2");
    }

    #[test]
    fn delete_reports_existence() {
        let store = SqliteMemoryStore::open_in_memory().expect("store");
        store.upsert_memory("city", "Cluj").expect("upsert");
        assert_eq!(store.delete_memory("city").expect("delete"), true);
        assert_eq!(store.delete_memory("city").expect("delete again"), false);
        assert!(store.list_memory().expect("list").is_empty());
    }

    #[test]
    fn data_survives_reopen() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("memory.db");
        {
            let store = SqliteMemoryStore::open(&path).expect("store");
            store.upsert_memory("name", "Ana").expect("upsert");
            store.add_note("first note").expect("note");
        }
        let store = SqliteMemoryStore::open(&path).expect("reopen");
        assert_eq!(store.list_memory().expect("list")["name"], "Ana");
        let notes = store.list_notes(Some(1)).expect("notes");
        assert_eq!(notes[0].content, "first note");
    }

    #[test]
    fn concurrent_upserts_on_different_keys_persist() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(SqliteMemoryStore::open(temp.path().join("memory.db")).expect("store"));

        let handles: Vec<_> = (0..8)
            .map(|idx| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .upsert_memory(&format!("key-{idx}"), &format!("value-{idx}"))
                        .expect("upsert");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        let memory = store.list_memory().expect("list");
        assert_eq!(memory.len(), 8);
        for idx in 0..8 {
            assert_eq!(memory[&format!("key-{idx}")], format!("value-{idx}"));
        }
    }
}
