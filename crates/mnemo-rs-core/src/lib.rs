//! Chat turn handling for Mnemo.
//!
//! This crate owns the reply directive protocol, request context assembly,
//! the completion client, and the single-worker dispatcher that the REPL and
//! the background relay share.

pub mod completion;
pub mod context;
pub mod directive;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod relay;
pub mod session;
pub mod types;

pub use completion::{
    CompletionProvider, CompletionRequest, CompletionStream, HttpCompletionProvider, LlmError,
};
pub use context::ContextBuilder;
pub use directive::{
    Directive, DirectiveExtractor, DirectiveFailure, DirectiveMatch, ExtractionReport,
    scan_directives,
};
pub use dispatch::{
    DEFAULT_MAX_SESSIONS, DispatcherHandle, TurnDispatcher, TurnRequest, WeakDispatcherHandle,
};
pub use engine::{ChatEngine, EngineSettings, MODEL_FAILURE_PREFIX, TurnOutcome};
pub use error::CoreError;
pub use relay::{InboundMessage, InboundSource, Relay, SourceError};
pub use session::SessionContext;
pub use types::{ConversationTurn, Role};
