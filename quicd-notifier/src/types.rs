//! # Core Send-Side Types
//!
//! Identifiers and small value types shared by the notifier, the control
//! frame ledger and the connection collaborator.

#![forbid(unsafe_code)]

use core::fmt;
use serde::{Deserialize, Serialize};

/// Byte offset within a stream.
pub type StreamOffset = u64;

/// Count of stream bytes.
pub type ByteCount = u64;

// ============================================================================
// Stream ID
// ============================================================================

/// Stream ID - Identifies an application byte stream on the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u64);

impl StreamId {
    /// Create a new StreamId
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl From<u64> for StreamId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl PartialEq<u64> for StreamId {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reserved stream id that never carries data.
pub const INVALID_STREAM_ID: StreamId = StreamId(0);

/// Default id of the stream carrying handshake data.
pub const DEFAULT_CRYPTO_STREAM_ID: StreamId = StreamId(1);

// ============================================================================
// Control Frame ID
// ============================================================================

/// Identifier assigned to every retransmittable control frame.
///
/// Ids are handed out by a strictly increasing counter starting at 1.
pub type ControlFrameId = u64;

/// Sentinel id: never assigned, and used to mark acknowledged ledger entries.
pub const INVALID_CONTROL_FRAME_ID: ControlFrameId = 0;

// ============================================================================
// Encryption Level
// ============================================================================

/// Protection tier a packet is sent under.
///
/// Variants are declared in ascending order; crypto retransmission resolves
/// levels in exactly this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EncryptionLevel {
    /// Initial keys derived from the connection id
    Initial = 0,
    /// Early data keys
    ZeroRtt = 1,
    /// Handshake keys
    Handshake = 2,
    /// Application data keys
    OneRtt = 3,
}

impl EncryptionLevel {
    /// Number of encryption levels.
    pub const COUNT: usize = 4;

    /// All levels in ascending order.
    pub const ALL: [EncryptionLevel; Self::COUNT] = [
        EncryptionLevel::Initial,
        EncryptionLevel::ZeroRtt,
        EncryptionLevel::Handshake,
        EncryptionLevel::OneRtt,
    ];

    /// Position of this level in [`EncryptionLevel::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl Default for EncryptionLevel {
    fn default() -> Self {
        EncryptionLevel::Initial
    }
}

// ============================================================================
// Transmission Type
// ============================================================================

/// Why a packet is being sent. Consulted by the connection on the next send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransmissionType {
    /// First transmission of new data
    NotRetransmission,
    /// Retransmission of lost handshake data
    HandshakeRetransmission,
    /// Forced retransmission of everything unacked (e.g. on key change)
    AllUnackedRetransmission,
    /// Forced retransmission of all Initial-level data
    AllInitialRetransmission,
    /// Retransmission after loss detection
    LossRetransmission,
    /// Tail loss probe
    TlpRetransmission,
    /// Retransmission timeout
    RtoRetransmission,
    /// Path probing
    ProbingRetransmission,
}

// ============================================================================
// Consumed Data
// ============================================================================

/// Outcome of a [`send_stream_data`] call.
///
/// [`send_stream_data`]: crate::connection::SessionConnection::send_stream_data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumedData {
    /// Bytes the connection accepted, from the requested offset onwards
    pub bytes_consumed: ByteCount,

    /// Whether the fin bit was accepted
    pub fin_consumed: bool,
}

impl ConsumedData {
    /// Create a new outcome
    pub const fn new(bytes_consumed: ByteCount, fin_consumed: bool) -> Self {
        Self {
            bytes_consumed,
            fin_consumed,
        }
    }

    /// Check whether a request of `length` bytes (plus `fin`) was fully accepted
    pub fn is_complete(&self, length: ByteCount, fin: bool) -> bool {
        self.bytes_consumed >= length && (!fin || self.fin_consumed)
    }
}

impl fmt::Display for ConsumedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bytes_consumed: {} fin_consumed: {}",
            self.bytes_consumed, self.fin_consumed
        )
    }
}
