//! Notifier configuration.
//!
//! Settings are read from TOML. Every section and field is optional and falls
//! back to its default.
//!
//! # Example
//!
//! ```toml
//! [notifier]
//! crypto_stream_id = 1
//! evict_acked_streams = false
//!
//! [logging]
//! level = "debug"
//! with_file = true
//! with_line_number = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{StreamId, DEFAULT_CRYPTO_STREAM_ID, INVALID_STREAM_ID};

/// Configuration validator trait.
pub trait ConfigValidator {
    /// Validate the configuration.
    ///
    /// Returns `Ok(())` if valid, or a list of error messages if invalid.
    fn validate(&self) -> std::result::Result<(), Vec<String>>;
}

/// Top-level configuration composing all sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delivery tracking behaviour
    pub notifier: NotifierConfig,

    /// Log output
    pub logging: LoggingConfig,
}

/// Delivery tracking behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Stream carrying handshake data (default: 1).
    ///
    /// Data on this stream is tracked per encryption level and retransmitted
    /// ahead of everything else.
    pub crypto_stream_id: StreamId,

    /// Drop the state of streams whose data and fin were all acknowledged
    /// (default: false).
    ///
    /// When disabled, finished streams stay in the stream map until reset so
    /// late acks can still be answered.
    pub evict_acked_streams: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            crypto_stream_id: DEFAULT_CRYPTO_STREAM_ID,
            evict_acked_streams: false,
        }
    }
}

impl ConfigValidator for NotifierConfig {
    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.crypto_stream_id == INVALID_STREAM_ID {
            errors.push(format!(
                "notifier.crypto_stream_id must not be the invalid stream id {}",
                INVALID_STREAM_ID
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset (default: "info").
    pub level: String,

    /// Include source file names in log lines (default: true).
    pub with_file: bool,

    /// Include source line numbers in log lines (default: true).
    pub with_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_file: true,
            with_line_number: true,
        }
    }
}

impl ConfigValidator for LoggingConfig {
    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        if self.level.parse::<tracing::Level>().is_err() {
            return Err(vec![format!(
                "logging.level '{}' is not one of trace, debug, info, warn, error",
                self.level
            )]);
        }
        Ok(())
    }
}

impl ConfigValidator for Config {
    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if let Err(e) = self.notifier.validate() {
            errors.extend(e);
        }
        if let Err(e) = self.logging.validate() {
            errors.extend(e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Config = toml::from_str(source)?;
        config.validate().map_err(Error::InvalidConfig)?;
        Ok(config)
    }
}

/// Load configuration from a TOML file.
///
/// A missing file is not an error: defaults are used and a warning is logged.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            config_path = %path.display(),
            "Configuration file not found, using defaults"
        );
        return Ok(Config::default());
    }

    let source = std::fs::read_to_string(path)?;
    Config::from_toml_str(&source)
}
