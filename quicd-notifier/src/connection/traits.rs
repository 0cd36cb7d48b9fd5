//! # Session Connection Trait
//!
//! Interface the notifier uses to hand stream data and control frames to the
//! underlying connection for packetization.
//!
//! ## Write-Blocking Contract
//!
//! The connection never blocks. When it cannot take everything offered it
//! accepts a prefix (or rejects a control frame outright) and the notifier
//! stops sending for the remainder of the current call. Sending resumes on
//! the next [`SessionNotifier::on_can_write`].
//!
//! [`SessionNotifier::on_can_write`]: crate::notifier::SessionNotifier::on_can_write

#![forbid(unsafe_code)]

use crate::frames::ControlFrame;
use crate::types::{
    ByteCount, ConsumedData, EncryptionLevel, StreamId, StreamOffset, TransmissionType,
};

/// Packet-emitting side of a connection.
pub trait SessionConnection {
    /// Offer `[offset, offset + length)` of a stream, optionally with the fin.
    ///
    /// May consume fewer bytes than offered and may decline the fin; never
    /// consumes more than offered.
    fn send_stream_data(
        &mut self,
        stream_id: StreamId,
        length: ByteCount,
        offset: StreamOffset,
        fin: bool,
    ) -> ConsumedData;

    /// Offer a control frame.
    ///
    /// Returns `false` when write blocked; a rejected frame was not sent.
    fn send_control_frame(&mut self, frame: &ControlFrame) -> bool;

    /// Tag the following sends with a transmission type
    fn set_transmission_type(&mut self, transmission_type: TransmissionType);

    /// Set the encryption level used by the following sends
    fn set_default_encryption_level(&mut self, level: EncryptionLevel);

    /// Encryption level used by the next send
    fn encryption_level(&self) -> EncryptionLevel;

    /// Emit any packet assembled from a batch of sends.
    ///
    /// Called when a [`ScopedPacketFlusher`](super::ScopedPacketFlusher)
    /// goes out of scope.
    fn flush_packets(&mut self) {}
}

impl<C: SessionConnection + ?Sized> SessionConnection for &mut C {
    fn send_stream_data(
        &mut self,
        stream_id: StreamId,
        length: ByteCount,
        offset: StreamOffset,
        fin: bool,
    ) -> ConsumedData {
        (**self).send_stream_data(stream_id, length, offset, fin)
    }

    fn send_control_frame(&mut self, frame: &ControlFrame) -> bool {
        (**self).send_control_frame(frame)
    }

    fn set_transmission_type(&mut self, transmission_type: TransmissionType) {
        (**self).set_transmission_type(transmission_type)
    }

    fn set_default_encryption_level(&mut self, level: EncryptionLevel) {
        (**self).set_default_encryption_level(level)
    }

    fn encryption_level(&self) -> EncryptionLevel {
        (**self).encryption_level()
    }

    fn flush_packets(&mut self) {
        (**self).flush_packets()
    }
}
