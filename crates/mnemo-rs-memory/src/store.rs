//! Memory store abstraction and provider selection.

use crate::error::MemoryError;
use crate::file::FileMemoryStore;
use crate::model::{MemoryEntry, Note};
use crate::sqlite::SqliteMemoryStore;
use log::info;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Durable key/value memory plus an append-only note log.
///
/// Every mutation is committed before the call returns, so the next context
/// build observes it. Implementations serialize access internally and are
/// shared across tasks behind an `Arc`.
pub trait MemoryStore: Send + Sync {
    /// Record or replace the value stored under `key`.
    fn upsert_memory(&self, key: &str, value: &str) -> Result<MemoryEntry, MemoryError>;

    /// Return the full key to value mapping.
    fn list_memory(&self) -> Result<BTreeMap<String, String>, MemoryError> {
        Ok(self
            .list_entries()?
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect())
    }

    /// Return every entry with its timestamp, sorted by key.
    fn list_entries(&self) -> Result<Vec<MemoryEntry>, MemoryError>;

    /// Remove a key. Returns whether it existed.
    fn delete_memory(&self, key: &str) -> Result<bool, MemoryError>;

    /// Append a note with a freshly generated identifier.
    fn add_note(&self, content: &str) -> Result<Note, MemoryError>;

    /// Return notes most recent first, optionally capped.
    fn list_notes(&self, limit: Option<usize>) -> Result<Vec<Note>, MemoryError>;
}

/// Supported store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreProvider {
    /// SQLite database with `memory` and `notes` tables.
    Sqlite,
    /// JSONL event log.
    File,
}

impl FromStr for StoreProvider {
    type Err = MemoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sqlite" => Ok(StoreProvider::Sqlite),
            "file" => Ok(StoreProvider::File),
            other => Err(MemoryError::UnknownProvider(other.to_string())),
        }
    }
}

/// Open the configured store at `path`.
pub fn open_store(
    provider: StoreProvider,
    path: impl AsRef<Path>,
) -> Result<Arc<dyn MemoryStore>, MemoryError> {
    let path = path.as_ref();
    info!(
        "opening memory store (provider={:?}, path={})",
        provider,
        path.display()
    );
    let store: Arc<dyn MemoryStore> = match provider {
        StoreProvider::Sqlite => Arc::new(SqliteMemoryStore::open(path)?),
        StoreProvider::File => Arc::new(FileMemoryStore::open(path)?),
    };
    Ok(store)
}
