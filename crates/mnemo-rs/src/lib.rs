//! Public SDK surface for Mnemo.
//!
//! Re-exports the building blocks used by the `mnemo` binary so embedders can
//! wire their own front end against the same store, engine and dispatcher.

/// Re-export for convenience.
pub use mnemo_rs_config as config;
pub use mnemo_rs_core as core;
/// Re-export for convenience.
pub use mnemo_rs_memory as memory;

/// Initialize `env_logger` with millisecond timestamps, honoring `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}
