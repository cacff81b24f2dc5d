//! Memory models shared by all stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Keyed fact the agent can recall across turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    /// Unique key.
    pub key: String,
    /// Latest value written for the key.
    pub value: String,
    /// Time of the latest write.
    pub updated_at: DateTime<Utc>,
}

/// Free-text note in the append-only log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    /// Strictly increasing identifier.
    pub id: i64,
    /// Note content.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
