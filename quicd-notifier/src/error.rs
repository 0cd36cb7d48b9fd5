//! Error types for the ambient surfaces of the notifier.
//!
//! The delivery-tracking core never fails: unknown ids and redundant acks are
//! no-ops, and write-blocked sends are reported through return values. Only
//! configuration loading and logging setup can return an [`Error`].

use std::io;
use thiserror::Error;

/// Result type for fallible notifier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for configuration and telemetry setup.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration file is not valid TOML or has mistyped fields.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration parsed but failed validation.
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Logging subscriber could not be installed.
    #[error("logging initialization failed: {0}")]
    Logging(String),
}
