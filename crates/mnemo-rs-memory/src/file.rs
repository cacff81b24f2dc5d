//! Memory persistence using an append-only JSONL event log.

use crate::error::MemoryError;
use crate::model::{MemoryEntry, Note};
use crate::store::MemoryStore;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const SCHEMA_VERSION: u32 = 1;

/// Internal JSONL event representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MemoryEvent {
    SchemaVersion {
        version: u32,
    },
    MemoryUpserted {
        key: String,
        value: String,
        updated_at: DateTime<Utc>,
    },
    MemoryDeleted {
        key: String,
    },
    NoteAdded {
        id: i64,
        content: String,
        created_at: DateTime<Utc>,
    },
}

/// State rebuilt by replaying the log.
#[derive(Default)]
struct ReplayState {
    entries: BTreeMap<String, MemoryEntry>,
    notes: Vec<Note>,
}

impl ReplayState {
    fn apply(&mut self, event: MemoryEvent) -> Result<(), MemoryError> {
        match event {
            MemoryEvent::SchemaVersion { version } => {
                if version > SCHEMA_VERSION {
                    return Err(MemoryError::UnsupportedSchema(version));
                }
            }
            MemoryEvent::MemoryUpserted {
                key,
                value,
                updated_at,
            } => {
                self.entries.insert(
                    key.clone(),
                    MemoryEntry {
                        key,
                        value,
                        updated_at,
                    },
                );
            }
            MemoryEvent::MemoryDeleted { key } => {
                self.entries.remove(&key);
            }
            MemoryEvent::NoteAdded {
                id,
                content,
                created_at,
            } => {
                self.notes.push(Note {
                    id,
                    content,
                    created_at,
                });
            }
        }
        Ok(())
    }

    fn next_note_id(&self) -> i64 {
        self.notes.iter().map(|note| note.id).max().unwrap_or(0) + 1
    }
}

/// JSONL-backed memory store.
pub struct FileMemoryStore {
    /// Log file path.
    path: PathBuf,
    /// Serialize access so id allocation and appends are atomic.
    lock: Mutex<()>,
}

impl FileMemoryStore {
    /// Open (or create) the log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        if path.exists() {
            repair_torn_tail(&path)?;
        }
        if fs::metadata(&path).map_or(true, |meta| meta.len() == 0) {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            let header = serde_json::to_string(&MemoryEvent::SchemaVersion {
                version: SCHEMA_VERSION,
            })?;
            writeln!(file, "{header}")?;
        }
        let store = Self {
            path,
            lock: Mutex::new(()),
        };
        // Fail early on a log written by a newer schema.
        store.replay()?;
        info!(
            "initialized JSONL memory store (path={})",
            store.path.display()
        );
        Ok(store)
    }

    /// Append one event to the log. Caller must hold the lock.
    fn append(&self, event: &MemoryEvent) -> Result<(), MemoryError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    /// Rebuild the current state from the log. Caller must hold the lock.
    fn replay(&self) -> Result<ReplayState, MemoryError> {
        let mut state = ReplayState::default();
        if !self.path.exists() {
            warn!("memory log missing (path={})", self.path.display());
            return Ok(state);
        }
        let file = OpenOptions::new().read(true).open(&self.path)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: MemoryEvent = serde_json::from_str(&line)?;
            state.apply(event)?;
        }
        Ok(state)
    }
}

/// Cut a partially written final event left by an interrupted append.
///
/// A final line that parses but lacks its newline is terminated instead.
fn repair_torn_tail(path: &Path) -> Result<(), MemoryError> {
    let raw = fs::read(path)?;
    if raw.is_empty() || raw.ends_with(b"\n") {
        return Ok(());
    }
    let keep = raw
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map_or(0, |idx| idx + 1);
    if serde_json::from_slice::<MemoryEvent>(&raw[keep..]).is_ok() {
        let mut file = OpenOptions::new().append(true).open(path)?;
        writeln!(file)?;
        return Ok(());
    }
    warn!(
        "discarding torn trailing event (path={}, bytes={})",
        path.display(),
        raw.len() - keep
    );
    OpenOptions::new()
        .write(true)
        .open(path)?
        .set_len(keep as u64)?;
    Ok(())
}

impl MemoryStore for FileMemoryStore {
    fn upsert_memory(&self, key: &str, value: &str) -> Result<MemoryEntry, MemoryError> {
        let _guard = self.lock.lock();
        let updated_at = Utc::now();
        self.append(&MemoryEvent::MemoryUpserted {
            key: key.to_string(),
            value: value.to_string(),
            updated_at,
        })?;
        debug!(
            "appended memory upsert (key={}, value_len={})",
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
        let _guard = self.lock.lock();
        Ok(self.replay()?.entries.into_values().collect())
    }

    fn delete_memory(&self, key: &str) -> Result<bool, MemoryError> {
        let _guard = self.lock.lock();
        if !self.replay()?.entries.contains_key(key) {
            return Ok(false);
        }
        self.append(&MemoryEvent::MemoryDeleted {
            key: key.to_string(),
        })?;
        info!("deleted memory entry (key={})", key);
        Ok(true)
    }

    fn add_note(&self, content: &str) -> Result<Note, MemoryError> {
        let _guard = self.lock.lock();
        let note = Note {
            id: self.replay()?.next_note_id(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.append(&MemoryEvent::NoteAdded {
            id: note.id,
            content: note.content.clone(),
            created_at: note.created_at,
        })?;
        debug!(
            "appended note (id={}, content_len={})",
            note.id,
            content.len()
        );
        Ok(note)
    }

    fn list_notes(&self, limit: Option<usize>) -> Result<Vec<Note>, MemoryError> {
        let _guard = self.lock.lock();
        let mut notes = self.replay()?.notes;
        notes.sort_by(|a, b| b.id.cmp(&a.id));
        if let Some(limit) = limit {
            notes.truncate(limit);
        }
        Ok(notes)
    }
}
