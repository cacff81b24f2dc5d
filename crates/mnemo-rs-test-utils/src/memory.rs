use mnemo_rs_memory::{MemoryEntry, MemoryError, MemoryStore, Note};
use std::io;

/// Store whose every operation fails with an IO error.
#[derive(Debug, Clone)]
pub struct FailingStore {
    message: String,
}

impl FailingStore {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn error(&self) -> MemoryError {
        MemoryError::Io(io::Error::other(self.message.clone()))
    }
}

impl MemoryStore for FailingStore {
    fn upsert_memory(&self, _key: &str, _value: &str) -> Result<MemoryEntry, MemoryError> {
        Err(self.error())
    }

    fn list_entries(&self) -> Result<Vec<MemoryEntry>, MemoryError> {
        Err(self.error())
    }

    fn delete_memory(&self, _key: &str) -> Result<bool, MemoryError> {
        Err(self.error())
    }

    fn add_note(&self, _content: &str) -> Result<Note, MemoryError> {
        Err(self.error())
    }

    fn list_notes(&self, _limit: Option<usize>) -> Result<Vec<Note>, MemoryError> {
        Err(self.error())
    }
}
