//! Durable agent memory for Mnemo.
//!
//! Holds the keyed memory map and the append-only note log that are rendered
//! into every system preamble and mutated by reply directives.

pub mod error;
pub mod file;
pub mod model;
pub mod policy;
pub mod sqlite;
pub mod store;

/// Memory error type.
pub use error::MemoryError;
/// File-backed store.
pub use file::FileMemoryStore;
/// Memory entry and note models.
pub use model::{MemoryEntry, Note};
/// Capture policy applied to directive values.
pub use policy::CapturePolicy;
/// SQLite-backed store.
pub use sqlite::SqliteMemoryStore;
/// Store interface and provider selection.
pub use store::{MemoryStore, StoreProvider, open_store};
