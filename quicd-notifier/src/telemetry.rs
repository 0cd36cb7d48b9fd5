//! # Logging Setup
//!
//! The notifier emits `tracing` events on its hot paths:
//!
//! - `trace`: every offer to the connection and what it consumed
//! - `debug`: ack/loss bookkeeping, fin-only and control frame retransmissions
//! - `warn`: writes queued because the connection is write blocked
//!
//! Embedders that already install a subscriber need nothing from this
//! module. [`init_logging`] is a convenience for binaries and tests.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails with
/// [`Error::Logging`] if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Logging(e.to_string()))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(config.with_line_number)
        .with_file(config.with_file);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!(level = %config.level, "Logging initialized");
    Ok(())
}
