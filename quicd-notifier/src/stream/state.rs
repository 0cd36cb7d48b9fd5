//! # Per-Stream Send State
//!
//! Counters and byte-range sets describing how far a stream's data has
//! progressed from buffered, to sent, to acknowledged or lost.
//!
//! ## State Overview
//!
//! ```text
//!  Idle ──write──▶ Buffering ──send──▶ PartiallySent ⇄ FullyAcked
//!                                            │
//!                                         HasLoss (orthogonal)
//! ```
//!
//! ## Invariants
//!
//! - `bytes_sent <= bytes_total`, both non-decreasing
//! - `bytes_acked ⊆ [0, bytes_sent)`
//! - `pending_retransmissions ⊆ [0, bytes_sent)` and disjoint from `bytes_acked`
//! - `fin_sent ⇒ fin_buffered`, `fin_outstanding ⇒ fin_sent`
//! - a lost fin keeps `fin_outstanding` set until it is acknowledged

#![forbid(unsafe_code)]

use crate::range_set::ByteRangeSet;
use crate::types::{ByteCount, StreamOffset};
use core::fmt;

/// Send-side bookkeeping for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    /// Total bytes ever buffered for sending
    bytes_total: ByteCount,

    /// Length of the prefix handed to the connection
    bytes_sent: ByteCount,

    /// Acknowledged byte ranges
    bytes_acked: ByteRangeSet,

    /// Sent byte ranges known to be lost and not yet resent
    pending_retransmissions: ByteRangeSet,

    /// Application has written the fin
    fin_buffered: bool,

    /// Fin has been handed to the connection
    fin_sent: bool,

    /// Fin was sent and is not yet acknowledged
    fin_outstanding: bool,

    /// Fin was lost and awaits retransmission
    fin_lost: bool,
}

impl StreamState {
    /// Create an idle stream
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_total(&self) -> ByteCount {
        self.bytes_total
    }

    pub fn bytes_sent(&self) -> ByteCount {
        self.bytes_sent
    }

    pub fn bytes_acked(&self) -> &ByteRangeSet {
        &self.bytes_acked
    }

    pub fn pending_retransmissions(&self) -> &ByteRangeSet {
        &self.pending_retransmissions
    }

    pub fn fin_buffered(&self) -> bool {
        self.fin_buffered
    }

    pub fn fin_sent(&self) -> bool {
        self.fin_sent
    }

    pub fn fin_outstanding(&self) -> bool {
        self.fin_outstanding
    }

    pub fn fin_lost(&self) -> bool {
        self.fin_lost
    }

    /// Bytes buffered but never handed to the connection
    pub fn bytes_to_send(&self) -> ByteCount {
        self.bytes_total - self.bytes_sent
    }

    /// Check if new data (or an unsent fin) is waiting to be sent
    pub fn has_buffered_data(&self) -> bool {
        self.bytes_total > self.bytes_sent || (self.fin_buffered && !self.fin_sent)
    }

    /// Check if lost data (or a lost fin) is waiting to be resent
    pub fn has_lost_data(&self) -> bool {
        !self.pending_retransmissions.is_empty() || self.fin_lost
    }

    /// Check if any sent byte or the sent fin is still unacknowledged
    pub fn is_waiting_for_acks(&self) -> bool {
        !self.bytes_acked.contains(0, self.bytes_sent) || self.fin_outstanding
    }

    /// Check if the stream finished and the peer acknowledged all of it,
    /// fin included
    pub fn is_fully_acked(&self) -> bool {
        self.fin_sent
            && !self.has_buffered_data()
            && !self.has_lost_data()
            && !self.is_waiting_for_acks()
    }

    /// Check if part of `[offset, offset + length)` or the fin it carries is
    /// still unacknowledged
    pub fn is_range_outstanding(&self, offset: StreamOffset, length: ByteCount, fin: bool) -> bool {
        (length > 0 && !self.bytes_acked.contains(offset, offset + length))
            || (fin && self.fin_outstanding)
    }

    /// Append `length` bytes to the send buffer
    pub(crate) fn buffer(&mut self, length: ByteCount, fin: bool) {
        debug_assert!(!self.fin_buffered || length == 0, "data written after fin");
        self.bytes_total += length;
        self.fin_buffered |= fin;
    }

    /// Advance the sent prefix after the connection consumed new data
    pub(crate) fn on_data_consumed(&mut self, length: ByteCount, fin: bool) {
        self.bytes_sent += length;
        debug_assert!(self.bytes_sent <= self.bytes_total);
        if fin {
            self.fin_sent = true;
            self.fin_outstanding = true;
        }
    }

    /// Record an acknowledgment of `[offset, offset + length)` (plus fin).
    ///
    /// Returns `false` when the ack carries no new information.
    pub(crate) fn on_acked(&mut self, offset: StreamOffset, length: ByteCount, fin: bool) -> bool {
        let end = offset + length;
        let mut newly_acked = ByteRangeSet::from_range(offset, end);
        newly_acked.difference_set(&self.bytes_acked);
        let fin_newly_acked = fin && self.fin_outstanding;
        if newly_acked.is_empty() && !fin_newly_acked {
            return false;
        }

        self.bytes_acked.add(offset, end);
        if fin_newly_acked {
            self.fin_outstanding = false;
            self.fin_lost = false;
        }
        self.pending_retransmissions.difference(offset, end);
        true
    }

    /// Record a loss of `[offset, offset + length)` (plus fin).
    ///
    /// Acknowledged bytes can never be lost. Returns `false` when nothing
    /// new became pending.
    pub(crate) fn on_lost(&mut self, offset: StreamOffset, length: ByteCount, fin: bool) -> bool {
        let mut bytes_lost = ByteRangeSet::from_range(offset, offset + length);
        bytes_lost.difference_set(&self.bytes_acked);
        let fin_lost = fin && self.fin_outstanding;
        if bytes_lost.is_empty() && !fin_lost {
            return false;
        }

        self.pending_retransmissions.add_set(&bytes_lost);
        if fin_lost {
            self.fin_lost = true;
        }
        true
    }

    /// Drop `[offset, offset + length)` from the retransmission queue after
    /// the connection consumed it
    pub(crate) fn on_retransmitted(&mut self, offset: StreamOffset, length: ByteCount) {
        let end = offset + length;
        self.pending_retransmissions.difference(offset, end);
    }

    /// Update the lost-fin flag after a fin retransmission attempt
    pub(crate) fn set_fin_lost(&mut self, lost: bool) {
        self.fin_lost = lost;
    }

    /// Mark `[offset, offset + length)` acknowledged without touching the fin
    pub(crate) fn neuter(&mut self, offset: StreamOffset, length: ByteCount) {
        let end = offset + length;
        self.bytes_acked.add(offset, end);
        self.pending_retransmissions.difference(offset, end);
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bytes_total: {} bytes_sent: {} bytes_acked: {} pending_retransmissions: {} \
             fin_buffered: {} fin_sent: {} fin_outstanding: {} fin_lost: {}",
            self.bytes_total,
            self.bytes_sent,
            self.bytes_acked,
            self.pending_retransmissions,
            self.fin_buffered,
            self.fin_sent,
            self.fin_outstanding,
            self.fin_lost
        )
    }
}
