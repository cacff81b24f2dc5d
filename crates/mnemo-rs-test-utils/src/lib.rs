//! Test helpers shared across Mnemo crates.

pub mod llm;
pub mod memory;
pub mod relay;

pub use llm::{FailingCompletion, FixedCompletion, RecordingCompletion, SlowCompletion, StreamingCompletion};
pub use memory::FailingStore;
pub use relay::ScriptedSource;
