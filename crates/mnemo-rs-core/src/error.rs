//! Error types for the core chat crate.

use mnemo_rs_memory::MemoryError;
use thiserror::Error;

/// Errors returned by core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The memory layer rejected the engine setup.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
    /// The dispatcher worker has shut down.
    #[error("turn dispatcher closed")]
    DispatcherClosed,
}
