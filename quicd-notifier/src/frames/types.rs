//! # Frame Types Tracked for Delivery (RFC 9000 Section 19)
//!
//! The notifier never sees frame payloads. A STREAM frame is described by its
//! `(stream_id, offset, length, fin)` tuple; control frames carry the id the
//! ledger assigned to them so acks and losses can be matched back.
//!
//! ## Frame Categories
//!
//! - **Stream data**: [`StreamFrame`], tracked per byte range
//! - **Control frames**: [`ControlFrame`], tracked per control frame id
//! - **Non-retransmittable**: [`Frame::Padding`], never tracked

#![forbid(unsafe_code)]

use crate::types::{ByteCount, ControlFrameId, StreamId, StreamOffset, INVALID_CONTROL_FRAME_ID};
use core::fmt;

/// Application error code carried in RESET_STREAM and STOP_SENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RstStreamErrorCode {
    /// Stream finished normally
    NoError,
    /// Local error while processing the stream
    ErrorProcessingStream,
    /// Peer sent conflicting final sizes
    MultipleTerminationOffsets,
    /// Payload could not be interpreted
    BadApplicationPayload,
    /// Connection is closing
    StreamConnectionError,
    /// Peer is going away
    PeerGoingAway,
    /// Application cancelled the stream
    StreamCancelled,
    /// Any other application-defined code
    Application(u64),
}

impl RstStreamErrorCode {
    /// Check whether a reset with this code is abnormal.
    ///
    /// Abnormal resets discard the stream's retransmission state.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, RstStreamErrorCode::NoError)
    }

    /// Wire value of the code
    pub fn code(&self) -> u64 {
        match self {
            RstStreamErrorCode::NoError => 0x00,
            RstStreamErrorCode::ErrorProcessingStream => 0x01,
            RstStreamErrorCode::MultipleTerminationOffsets => 0x02,
            RstStreamErrorCode::BadApplicationPayload => 0x03,
            RstStreamErrorCode::StreamConnectionError => 0x04,
            RstStreamErrorCode::PeerGoingAway => 0x05,
            RstStreamErrorCode::StreamCancelled => 0x06,
            RstStreamErrorCode::Application(code) => *code,
        }
    }
}

// ============================================================================
// Stream Data
// ============================================================================

/// STREAM Frame (RFC 9000 Section 19.8)
///
/// Describes `[offset, offset + data_length)` of a stream, optionally with
/// the FIN bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFrame {
    /// Stream ID
    pub stream_id: StreamId,

    /// Byte offset of the first byte in the frame
    pub offset: StreamOffset,

    /// Number of stream bytes in the frame
    pub data_length: ByteCount,

    /// FIN bit: the frame ends the stream
    pub fin: bool,
}

impl StreamFrame {
    /// Create a new stream frame descriptor
    pub const fn new(
        stream_id: StreamId,
        offset: StreamOffset,
        data_length: ByteCount,
        fin: bool,
    ) -> Self {
        Self {
            stream_id,
            offset,
            data_length,
            fin,
        }
    }

    /// Exclusive end offset of the frame's data
    pub fn end(&self) -> StreamOffset {
        self.offset + self.data_length
    }
}

// ============================================================================
// Control Frames
// ============================================================================

/// RESET_STREAM Frame (RFC 9000 Section 19.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetStreamFrame {
    /// Ledger id
    pub control_frame_id: ControlFrameId,

    /// Stream ID being reset
    pub stream_id: StreamId,

    /// Application-defined error code
    pub error_code: RstStreamErrorCode,

    /// Number of bytes written on the stream before the reset
    pub bytes_written: StreamOffset,
}

/// STOP_SENDING Frame (RFC 9000 Section 19.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopSendingFrame {
    /// Ledger id
    pub control_frame_id: ControlFrameId,

    /// Stream ID to stop sending on
    pub stream_id: StreamId,

    /// Application-defined error code
    pub error_code: RstStreamErrorCode,
}

/// MAX_DATA Frame (RFC 9000 Section 19.9)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxDataFrame {
    /// Ledger id
    pub control_frame_id: ControlFrameId,

    /// Maximum data in bytes
    pub maximum_data: u64,
}

/// MAX_STREAM_DATA Frame (RFC 9000 Section 19.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreamDataFrame {
    /// Ledger id
    pub control_frame_id: ControlFrameId,

    /// Stream ID
    pub stream_id: StreamId,

    /// Maximum stream data in bytes
    pub maximum_stream_data: u64,
}

/// DATA_BLOCKED Frame (RFC 9000 Section 19.12)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlockedFrame {
    /// Ledger id
    pub control_frame_id: ControlFrameId,

    /// Connection-level limit at which blocking occurred
    pub data_limit: u64,
}

/// STREAM_DATA_BLOCKED Frame (RFC 9000 Section 19.13)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDataBlockedFrame {
    /// Ledger id
    pub control_frame_id: ControlFrameId,

    /// Stream ID
    pub stream_id: StreamId,

    /// Stream-level limit at which blocking occurred
    pub stream_data_limit: u64,
}

/// PING Frame (RFC 9000 Section 19.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingFrame {
    /// Ledger id
    pub control_frame_id: ControlFrameId,
}

/// Retransmittable connection-level frame.
///
/// Each variant carries the id assigned when the frame entered the
/// [`ControlFrameLedger`](crate::control::ControlFrameLedger). Acknowledged
/// ledger entries have their id cleared to [`INVALID_CONTROL_FRAME_ID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    ResetStream(ResetStreamFrame),
    StopSending(StopSendingFrame),
    MaxData(MaxDataFrame),
    MaxStreamData(MaxStreamDataFrame),
    DataBlocked(DataBlockedFrame),
    StreamDataBlocked(StreamDataBlockedFrame),
    Ping(PingFrame),
}

impl ControlFrame {
    /// Build a RESET_STREAM frame with an unassigned id
    pub fn reset_stream(
        stream_id: StreamId,
        error_code: RstStreamErrorCode,
        bytes_written: StreamOffset,
    ) -> Self {
        ControlFrame::ResetStream(ResetStreamFrame {
            control_frame_id: INVALID_CONTROL_FRAME_ID,
            stream_id,
            error_code,
            bytes_written,
        })
    }

    /// Build a STOP_SENDING frame with an unassigned id
    pub fn stop_sending(stream_id: StreamId, error_code: RstStreamErrorCode) -> Self {
        ControlFrame::StopSending(StopSendingFrame {
            control_frame_id: INVALID_CONTROL_FRAME_ID,
            stream_id,
            error_code,
        })
    }

    /// Build a MAX_DATA frame with an unassigned id
    pub fn max_data(maximum_data: u64) -> Self {
        ControlFrame::MaxData(MaxDataFrame {
            control_frame_id: INVALID_CONTROL_FRAME_ID,
            maximum_data,
        })
    }

    /// Build a MAX_STREAM_DATA frame with an unassigned id
    pub fn max_stream_data(stream_id: StreamId, maximum_stream_data: u64) -> Self {
        ControlFrame::MaxStreamData(MaxStreamDataFrame {
            control_frame_id: INVALID_CONTROL_FRAME_ID,
            stream_id,
            maximum_stream_data,
        })
    }

    /// Build a DATA_BLOCKED frame with an unassigned id
    pub fn data_blocked(data_limit: u64) -> Self {
        ControlFrame::DataBlocked(DataBlockedFrame {
            control_frame_id: INVALID_CONTROL_FRAME_ID,
            data_limit,
        })
    }

    /// Build a STREAM_DATA_BLOCKED frame with an unassigned id
    pub fn stream_data_blocked(stream_id: StreamId, stream_data_limit: u64) -> Self {
        ControlFrame::StreamDataBlocked(StreamDataBlockedFrame {
            control_frame_id: INVALID_CONTROL_FRAME_ID,
            stream_id,
            stream_data_limit,
        })
    }

    /// Build a PING frame with an unassigned id
    pub fn ping() -> Self {
        ControlFrame::Ping(PingFrame {
            control_frame_id: INVALID_CONTROL_FRAME_ID,
        })
    }

    /// Ledger id of this frame
    pub fn control_frame_id(&self) -> ControlFrameId {
        match self {
            ControlFrame::ResetStream(f) => f.control_frame_id,
            ControlFrame::StopSending(f) => f.control_frame_id,
            ControlFrame::MaxData(f) => f.control_frame_id,
            ControlFrame::MaxStreamData(f) => f.control_frame_id,
            ControlFrame::DataBlocked(f) => f.control_frame_id,
            ControlFrame::StreamDataBlocked(f) => f.control_frame_id,
            ControlFrame::Ping(f) => f.control_frame_id,
        }
    }

    /// Overwrite the ledger id
    pub fn set_control_frame_id(&mut self, id: ControlFrameId) {
        let slot = match self {
            ControlFrame::ResetStream(f) => &mut f.control_frame_id,
            ControlFrame::StopSending(f) => &mut f.control_frame_id,
            ControlFrame::MaxData(f) => &mut f.control_frame_id,
            ControlFrame::MaxStreamData(f) => &mut f.control_frame_id,
            ControlFrame::DataBlocked(f) => &mut f.control_frame_id,
            ControlFrame::StreamDataBlocked(f) => &mut f.control_frame_id,
            ControlFrame::Ping(f) => &mut f.control_frame_id,
        };
        *slot = id;
    }

    /// Short frame type name for logging
    pub fn name(&self) -> &'static str {
        match self {
            ControlFrame::ResetStream(_) => "RESET_STREAM",
            ControlFrame::StopSending(_) => "STOP_SENDING",
            ControlFrame::MaxData(_) => "MAX_DATA",
            ControlFrame::MaxStreamData(_) => "MAX_STREAM_DATA",
            ControlFrame::DataBlocked(_) => "DATA_BLOCKED",
            ControlFrame::StreamDataBlocked(_) => "STREAM_DATA_BLOCKED",
            ControlFrame::Ping(_) => "PING",
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// A frame reported acked, lost, or queued for forced retransmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// STREAM frame (including data on the crypto stream)
    Stream(StreamFrame),

    /// Retransmittable control frame
    Control(ControlFrame),

    /// PADDING frames (RFC 9000 Section 19.1), never retransmitted
    Padding { num_bytes: usize },
}

impl Frame {
    /// Ledger id for control frames, [`INVALID_CONTROL_FRAME_ID`] otherwise
    pub fn control_frame_id(&self) -> ControlFrameId {
        match self {
            Frame::Control(control) => control.control_frame_id(),
            Frame::Stream(_) | Frame::Padding { .. } => INVALID_CONTROL_FRAME_ID,
        }
    }
}

impl From<StreamFrame> for Frame {
    fn from(frame: StreamFrame) -> Self {
        Frame::Stream(frame)
    }
}

impl From<ControlFrame> for Frame {
    fn from(frame: ControlFrame) -> Self {
        Frame::Control(frame)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Stream(s) => write!(
                f,
                "STREAM {{ stream_id: {}, offset: {}, length: {}, fin: {} }}",
                s.stream_id, s.offset, s.data_length, s.fin
            ),
            Frame::Control(c) => {
                let id = c.control_frame_id();
                write!(f, "{} {{ control_frame_id: {} }}", c.name(), id)
            }
            Frame::Padding { num_bytes } => write!(f, "PADDING {{ num_bytes: {} }}", num_bytes),
        }
    }
}
