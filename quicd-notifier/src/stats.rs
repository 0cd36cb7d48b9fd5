//! Send-side counters.

#![forbid(unsafe_code)]

use serde::Serialize;

/// Counters accumulated over a notifier's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotifierStats {
    /// New stream bytes accepted by the connection
    pub stream_bytes_sent: u64,

    /// Lost stream bytes accepted again
    pub stream_bytes_retransmitted: u64,

    /// Lost crypto stream bytes accepted again
    pub crypto_bytes_retransmitted: u64,

    /// Control frames accepted on first transmission
    pub control_frames_sent: u64,

    /// Control frames accepted again after loss or forced retransmission
    pub control_frames_retransmitted: u64,

    /// Times a send was cut short because the connection was write blocked
    pub write_blocked_events: u64,
}
