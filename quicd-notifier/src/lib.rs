//! quicd-notifier: Send-Side Delivery Tracking for QUIC Sessions
//!
//! Tracks, for one connection, which stream bytes and control frames have been
//! sent, acknowledged or lost, and decides what to hand to the connection next.
//! Packetization, encryption, loss detection and congestion control live in
//! the connection; this crate only decides *what* and *when*.
//!
//! # Architecture
//!
//! - **Single owner**: a [`SessionNotifier`] is driven by its connection on one
//!   thread; every call runs to completion
//! - **Level-triggered retry**: partial acceptance by the connection ends the
//!   current call; the connection calls `on_can_write` when writable again
//! - **Interval sets**: per-stream acked and lost bytes are [`ByteRangeSet`]s
//! - **Scoped send context**: encryption level switches are RAII guards
//!
//! # Module Organization
//!
//! - `types`: Stream ids, encryption levels, transmission types
//! - `range_set`: Ordered set of disjoint byte ranges
//! - `frames`: Stream and control frame descriptors
//! - `stream`: Per-stream send state and crypto transfer record
//! - `control`: Control frame ledger
//! - `connection`: Connection collaborator trait and scoped guards
//! - `notifier`: The session notifier
//! - `config`, `telemetry`, `error`, `stats`: Configuration, logging setup,
//!   errors and counters

pub mod config;
pub mod connection;
pub mod control;
pub mod error;
pub mod frames;
pub mod notifier;
pub mod range_set;
pub mod stats;
pub mod stream;
pub mod telemetry;
pub mod types;

// Re-export key types
pub use config::{load_config, Config, ConfigValidator, LoggingConfig, NotifierConfig};
pub use connection::{ScopedEncryptionLevel, ScopedPacketFlusher, SessionConnection};
pub use control::ControlFrameLedger;
pub use error::{Error, Result};
pub use frames::{ControlFrame, Frame, RstStreamErrorCode, StreamFrame};
pub use notifier::SessionNotifier;
pub use range_set::ByteRangeSet;
pub use stats::NotifierStats;
pub use stream::{CryptoTransferMap, StreamState};
pub use telemetry::init_logging;
pub use types::{
    ByteCount, ConsumedData, ControlFrameId, EncryptionLevel, StreamId, StreamOffset,
    TransmissionType, DEFAULT_CRYPTO_STREAM_ID, INVALID_CONTROL_FRAME_ID, INVALID_STREAM_ID,
};
