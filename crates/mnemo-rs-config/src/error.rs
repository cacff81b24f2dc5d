//! Errors raised while assembling Mnemo's configuration.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config layer exists (or was required) but could not be read.
    #[error("cannot read config layer {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    /// A layer is not well-formed JSON5.
    #[error("config layer {origin} is not valid JSON5: {source}")]
    Syntax {
        origin: String,
        source: json5::Error,
    },
    /// A setting has the wrong shape or an unusable value.
    ///
    /// `path` is `origin:dotted.setting`, or the bare dotted setting when the
    /// merged config is checked.
    #[error("config setting {path} rejected: {message}")]
    InvalidField { path: String, message: String },
    /// The merged layers do not decode into the settings model.
    #[error("config does not match the Mnemo settings model: {0}")]
    Decode(#[from] serde_json::Error),
}
