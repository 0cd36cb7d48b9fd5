//! # Crypto Stream Transfer Record (RFC 9001 Section 4)
//!
//! Handshake data must be retransmitted under the keys it was originally
//! protected with, not the connection's current keys. This module remembers,
//! per encryption level, which crypto stream offsets were first sent at that
//! level.

#![forbid(unsafe_code)]

use crate::range_set::ByteRangeSet;
use crate::types::{ByteCount, EncryptionLevel, StreamOffset};

/// Crypto stream offsets sent at each encryption level.
#[derive(Debug, Clone, Default)]
pub struct CryptoTransferMap {
    levels: [ByteRangeSet; EncryptionLevel::COUNT],
}

impl CryptoTransferMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `[offset, offset + length)` was sent at `level`
    pub fn record(&mut self, level: EncryptionLevel, offset: StreamOffset, length: ByteCount) {
        self.levels[level.index()].add(offset, offset + length);
    }

    /// Offsets sent at `level`
    pub fn transferred_at(&self, level: EncryptionLevel) -> &ByteRangeSet {
        &self.levels[level.index()]
    }

    /// Find the level a retransmission must use.
    ///
    /// Levels are tried in ascending order; the first one whose record
    /// intersects `retransmission` wins and `retransmission` is clipped to
    /// that record. Returns `None`, leaving the set untouched, when no level
    /// recorded any of those bytes.
    pub fn resolve(&self, retransmission: &mut ByteRangeSet) -> Option<EncryptionLevel> {
        for level in EncryptionLevel::ALL {
            let transferred = &self.levels[level.index()];
            if retransmission.intersects(transferred) {
                retransmission.intersection(transferred);
                return Some(level);
            }
        }
        None
    }
}
