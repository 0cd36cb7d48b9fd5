//! # Session Notifier
//!
//! Decides which stream bytes and control frames are outstanding, which must
//! be retransmitted, and in what order everything is handed to the
//! connection.
//!
//! ## Send Priority
//!
//! Every [`SessionNotifier::on_can_write`] walks the following steps in order
//! and returns as soon as one of them is write blocked:
//!
//! 1. Lost crypto stream data, at the encryption level it was first sent at
//! 2. Lost control frames
//! 3. Lost stream data (and lost fins), stream by stream
//! 4. Control frames never sent
//! 5. New stream data, stream by stream
//!
//! ## Back-Pressure
//!
//! Writes arriving while anything is still buffered are queued without
//! touching the connection, so one blocked stream or frame holds back every
//! opportunistic send until the next `on_can_write`.
//!
//! ## Ack and Loss Events
//!
//! Acks and losses arrive per frame. Stream frames update the per-stream
//! [`StreamState`]; control frames update the [`ControlFrameLedger`]. Events
//! for streams that no longer exist are ignored: a stream may have been reset
//! while its frames were in flight.

#![forbid(unsafe_code)]

use core::time::Duration;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

use crate::config::NotifierConfig;
use crate::connection::{ScopedEncryptionLevel, ScopedPacketFlusher, SessionConnection};
use crate::control::ControlFrameLedger;
use crate::frames::{ControlFrame, Frame, RstStreamErrorCode, StreamFrame};
use crate::range_set::ByteRangeSet;
use crate::stats::NotifierStats;
use crate::stream::{CryptoTransferMap, StreamState};
use crate::types::{
    ByteCount, ConsumedData, ControlFrameId, EncryptionLevel, StreamId, StreamOffset,
    TransmissionType, INVALID_CONTROL_FRAME_ID,
};

#[cfg(test)]
mod tests;

/// Send-side delivery tracker for one connection.
///
/// Owns the connection collaborator `C`. All calls must be serialized by the
/// owner; nothing here is reentrant.
#[derive(Debug)]
pub struct SessionNotifier<C: SessionConnection> {
    connection: C,
    config: NotifierConfig,

    /// Per-stream state, iterated in ascending stream id order
    streams: BTreeMap<StreamId, StreamState>,

    /// Encryption level each crypto stream byte was first sent at
    crypto_transfers: CryptoTransferMap,

    control_frames: ControlFrameLedger,
    stats: NotifierStats,
}

impl<C: SessionConnection> SessionNotifier<C> {
    /// Create a notifier with default configuration
    pub fn new(connection: C) -> Self {
        Self::with_config(connection, NotifierConfig::default())
    }

    /// Create a notifier with explicit configuration
    pub fn with_config(connection: C, config: NotifierConfig) -> Self {
        Self {
            connection,
            config,
            streams: BTreeMap::new(),
            crypto_transfers: CryptoTransferMap::new(),
            control_frames: ControlFrameLedger::new(),
            stats: NotifierStats::default(),
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn stats(&self) -> &NotifierStats {
        &self.stats
    }

    /// Send state of a stream, if tracked
    pub fn stream_state(&self, id: StreamId) -> Option<&StreamState> {
        self.streams.get(&id)
    }

    pub fn control_frames(&self) -> &ControlFrameLedger {
        &self.control_frames
    }

    pub fn crypto_transfers(&self) -> &CryptoTransferMap {
        &self.crypto_transfers
    }

    fn crypto_stream_id(&self) -> StreamId {
        self.config.crypto_stream_id
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Buffer `length` new bytes (and optionally the fin) on a stream.
    ///
    /// If nothing else is buffered, the stream's whole backlog is offered to
    /// the connection right away and the consumed amount is returned.
    /// Otherwise the data is queued for [`on_can_write`](Self::on_can_write)
    /// and nothing is reported consumed.
    pub fn write_or_buffer_data(
        &mut self,
        id: StreamId,
        length: ByteCount,
        fin: bool,
    ) -> ConsumedData {
        let had_buffered_data = self.has_buffered_data();

        let state = self.streams.entry(id).or_default();
        trace!(
            stream_id = %id,
            offset = state.bytes_total(),
            end = state.bytes_total() + length,
            fin,
            "WriteOrBuffer"
        );
        state.buffer(length, fin);

        if had_buffered_data {
            warn!(stream_id = %id, "Connection is write blocked");
            return ConsumedData::default();
        }

        let (consumed, _) = self.send_buffered_stream_data(id);
        consumed
    }

    /// Queue a RESET_STREAM for `id`.
    ///
    /// Abnormal resets drop the stream's state so none of its data is ever
    /// retransmitted. The frame is flushed immediately unless something is
    /// already buffered.
    pub fn write_or_buffer_rst_stream(
        &mut self,
        id: StreamId,
        error_code: RstStreamErrorCode,
        bytes_written: StreamOffset,
    ) -> ControlFrameId {
        debug!(
            stream_id = %id,
            error_code = error_code.code(),
            bytes_written,
            "Writing RESET_STREAM"
        );
        let had_buffered_data = self.has_buffered_data();

        let frame = ControlFrame::reset_stream(id, error_code, bytes_written);
        let frame_id = self.control_frames.append(frame);
        if error_code.is_abnormal() {
            self.streams.remove(&id);
        } else {
            self.streams.entry(id).or_default();
        }

        self.flush_new_control_frame(had_buffered_data);
        frame_id
    }

    /// Queue any other control frame, flushing it immediately unless
    /// something is already buffered.
    pub fn write_or_buffer_control_frame(&mut self, frame: ControlFrame) -> ControlFrameId {
        debug!(frame_type = frame.name(), "Writing control frame");
        let had_buffered_data = self.has_buffered_data();
        let frame_id = self.control_frames.append(frame);
        self.flush_new_control_frame(had_buffered_data);
        frame_id
    }

    /// Queue a PING
    pub fn write_or_buffer_ping(&mut self) -> ControlFrameId {
        self.write_or_buffer_control_frame(ControlFrame::ping())
    }

    fn flush_new_control_frame(&mut self, had_buffered_data: bool) {
        if had_buffered_data {
            warn!("Connection is write blocked");
            return;
        }
        self.write_buffered_control_frames();
    }

    /// Treat every crypto byte sent at the Initial level as acknowledged.
    ///
    /// Called once Initial keys are discarded: that data can no longer be
    /// retransmitted and must not hold up the handshake.
    pub fn neuter_unencrypted_data(&mut self) {
        let crypto_id = self.crypto_stream_id();
        let initial: Vec<_> = self
            .crypto_transfers
            .transferred_at(EncryptionLevel::Initial)
            .iter()
            .collect();
        let Some(state) = self.streams.get_mut(&crypto_id) else {
            return;
        };
        for range in initial {
            debug!(
                offset = range.start,
                end = range.end,
                "Neutering Initial crypto data"
            );
            state.neuter(range.start, range.end - range.start);
        }
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Resume sending after the connection became writable.
    ///
    /// Runs the priority steps described in the module docs, stopping at the
    /// first one that is still write blocked.
    pub fn on_can_write(&mut self) {
        if !self.retransmit_lost_crypto_data()
            || !self.retransmit_lost_control_frames()
            || !self.retransmit_lost_stream_data()
        {
            return;
        }
        if !self.write_buffered_control_frames() {
            return;
        }
        self.write_new_stream_data();
    }

    fn retransmit_lost_crypto_data(&mut self) -> bool {
        let crypto_id = self.crypto_stream_id();
        loop {
            let Some(state) = self.streams.get(&crypto_id) else {
                return true;
            };
            let Some(pending) = state.pending_retransmissions().first() else {
                return true;
            };

            self.connection
                .set_transmission_type(TransmissionType::HandshakeRetransmission);
            let mut retransmission = ByteRangeSet::from(pending);
            let level = self
                .crypto_transfers
                .resolve(&mut retransmission)
                .unwrap_or(EncryptionLevel::Initial);
            let Some(range) = retransmission.first() else {
                return true;
            };
            let length = range.end - range.start;

            let consumed = {
                let mut scoped = ScopedEncryptionLevel::new(&mut self.connection, level);
                scoped.send_stream_data(crypto_id, length, range.start, false)
            };
            trace!(
                stream_id = %crypto_id,
                offset = range.start,
                end = range.end,
                level = ?level,
                %consumed,
                "Retransmitting crypto data"
            );

            self.stats.crypto_bytes_retransmitted += consumed.bytes_consumed;
            if let Some(state) = self.streams.get_mut(&crypto_id) {
                state.on_retransmitted(range.start, consumed.bytes_consumed);
            }
            if consumed.bytes_consumed < length {
                self.on_write_blocked();
                return false;
            }
        }
    }

    fn retransmit_lost_control_frames(&mut self) -> bool {
        while let Some(frame) = self.control_frames.first_lost().copied() {
            self.connection
                .set_transmission_type(TransmissionType::LossRetransmission);
            if !self.connection.send_control_frame(&frame) {
                self.on_write_blocked();
                return false;
            }
            debug!(
                frame_type = frame.name(),
                control_frame_id = frame.control_frame_id(),
                "Retransmitted lost control frame"
            );
            self.control_frames.pop_first_lost();
            self.stats.control_frames_retransmitted += 1;
        }
        !self.control_frames.has_lost()
    }

    fn retransmit_lost_stream_data(&mut self) -> bool {
        let lossy: Vec<StreamId> = self
            .streams
            .iter()
            .filter(|(_, state)| state.has_lost_data())
            .map(|(&id, _)| id)
            .collect();
        for id in lossy {
            if !self.retransmit_lost_data_of(id) {
                return false;
            }
        }
        !self.has_lost_stream_data()
    }

    /// Resend every lost range of one stream, bundling a lost fin with the
    /// final range when possible. Returns `false` when write blocked.
    fn retransmit_lost_data_of(&mut self, id: StreamId) -> bool {
        loop {
            let Some(state) = self.streams.get(&id) else {
                return true;
            };
            if !state.has_lost_data() {
                return true;
            }
            let bytes_sent = state.bytes_sent();
            let fin_lost = state.fin_lost();
            let pending = state.pending_retransmissions().first();

            self.connection
                .set_transmission_type(TransmissionType::LossRetransmission);
            match pending {
                None => {
                    debug!(stream_id = %id, "Retransmitting fin only frame");
                    let consumed = self.connection.send_stream_data(id, 0, bytes_sent, true);
                    if let Some(state) = self.streams.get_mut(&id) {
                        state.set_fin_lost(!consumed.fin_consumed);
                    }
                    if !consumed.fin_consumed {
                        self.on_write_blocked();
                        return false;
                    }
                }
                Some(range) => {
                    let length = range.end - range.start;
                    let can_bundle_fin = fin_lost && range.end == bytes_sent;
                    let consumed = self
                        .connection
                        .send_stream_data(id, length, range.start, can_bundle_fin);
                    trace!(
                        stream_id = %id,
                        offset = range.start,
                        end = range.end,
                        fin = can_bundle_fin,
                        %consumed,
                        "Retransmitting lost stream data"
                    );

                    self.stats.stream_bytes_retransmitted += consumed.bytes_consumed;
                    if let Some(state) = self.streams.get_mut(&id) {
                        state.on_retransmitted(range.start, consumed.bytes_consumed);
                        if consumed.fin_consumed {
                            state.set_fin_lost(false);
                        }
                    }
                    if !consumed.is_complete(length, can_bundle_fin) {
                        self.on_write_blocked();
                        return false;
                    }
                }
            }
        }
    }

    fn write_buffered_control_frames(&mut self) -> bool {
        while let Some(frame) = self.control_frames.next_unsent().copied() {
            self.connection
                .set_transmission_type(TransmissionType::NotRetransmission);
            if !self.connection.send_control_frame(&frame) {
                self.on_write_blocked();
                return false;
            }
            trace!(
                frame_type = frame.name(),
                control_frame_id = frame.control_frame_id(),
                "Sent control frame"
            );
            self.control_frames.mark_sent();
            self.stats.control_frames_sent += 1;
        }
        !self.control_frames.has_buffered()
    }

    fn write_new_stream_data(&mut self) -> bool {
        let backlogged: Vec<StreamId> = self
            .streams
            .iter()
            .filter(|(_, state)| state.has_buffered_data())
            .map(|(&id, _)| id)
            .collect();
        for id in backlogged {
            let (_, complete) = self.send_buffered_stream_data(id);
            if !complete {
                return false;
            }
        }
        true
    }

    /// Offer a stream's entire backlog (and its fin, if buffered).
    ///
    /// Returns what was consumed and whether everything offered was taken.
    fn send_buffered_stream_data(&mut self, id: StreamId) -> (ConsumedData, bool) {
        let Some(state) = self.streams.get(&id) else {
            return (ConsumedData::default(), true);
        };
        if !state.has_buffered_data() {
            return (ConsumedData::default(), true);
        }
        let offset = state.bytes_sent();
        let length = state.bytes_to_send();
        let fin = state.fin_buffered();

        self.connection
            .set_transmission_type(TransmissionType::NotRetransmission);
        let consumed = self.connection.send_stream_data(id, length, offset, fin);
        trace!(
            stream_id = %id,
            offset,
            end = offset + length,
            fin,
            %consumed,
            "Sent new stream data"
        );
        self.on_stream_data_consumed(id, offset, consumed);

        let complete = consumed.is_complete(length, fin);
        if !complete {
            self.on_write_blocked();
        }
        (consumed, complete)
    }

    fn on_stream_data_consumed(
        &mut self,
        id: StreamId,
        offset: StreamOffset,
        consumed: ConsumedData,
    ) {
        if id == self.crypto_stream_id() && consumed.bytes_consumed > 0 {
            let level = self.connection.encryption_level();
            self.crypto_transfers
                .record(level, offset, consumed.bytes_consumed);
        }
        self.stats.stream_bytes_sent += consumed.bytes_consumed;
        if let Some(state) = self.streams.get_mut(&id) {
            state.on_data_consumed(consumed.bytes_consumed, consumed.fin_consumed);
        }
    }

    fn on_write_blocked(&mut self) {
        debug!("Connection is write blocked");
        self.stats.write_blocked_events += 1;
    }

    // ========================================================================
    // Ack / Loss
    // ========================================================================

    /// Process the acknowledgment of a frame.
    ///
    /// Returns `true` if it acknowledged anything not acknowledged before.
    pub fn on_frame_acked(&mut self, frame: &Frame, _ack_delay: Duration) -> bool {
        debug!(%frame, "Acking");
        match frame {
            Frame::Stream(stream_frame) => self.on_stream_frame_acked(stream_frame),
            Frame::Control(control) => self.control_frames.on_acked(control.control_frame_id()),
            Frame::Padding { .. } => false,
        }
    }

    fn on_stream_frame_acked(&mut self, frame: &StreamFrame) -> bool {
        let crypto_id = self.crypto_stream_id();
        let evict_acked_streams = self.config.evict_acked_streams;
        let Some(state) = self.streams.get_mut(&frame.stream_id) else {
            return false;
        };
        let newly_acked = state.on_acked(frame.offset, frame.data_length, frame.fin);

        let evict = newly_acked
            && evict_acked_streams
            && frame.stream_id != crypto_id
            && state.is_fully_acked();
        if evict {
            debug!(stream_id = %frame.stream_id, "Evicting fully acknowledged stream");
            self.streams.remove(&frame.stream_id);
        }
        newly_acked
    }

    /// Process the loss of a frame.
    pub fn on_frame_lost(&mut self, frame: &Frame) {
        debug!(%frame, "Losing");
        match frame {
            Frame::Stream(f) => {
                if let Some(state) = self.streams.get_mut(&f.stream_id) {
                    state.on_lost(f.offset, f.data_length, f.fin);
                }
            }
            Frame::Control(control) => self.control_frames.on_lost(control.control_frame_id()),
            Frame::Padding { .. } => {}
        }
    }

    /// Force retransmission of `frames`, e.g. after a key or path change.
    ///
    /// Only still-unacked parts are resent. Crypto data goes out at the level
    /// it was first sent at. Stops at the first write-blocked frame.
    pub fn retransmit_frames(&mut self, frames: &[Frame], transmission_type: TransmissionType) {
        let crypto_id = self.crypto_stream_id();
        let mut flusher = ScopedPacketFlusher::new(&mut self.connection);
        flusher.set_transmission_type(transmission_type);

        for frame in frames {
            match frame {
                Frame::Padding { .. } => continue,
                Frame::Control(control) => {
                    let id = control.control_frame_id();
                    if id == INVALID_CONTROL_FRAME_ID || !self.control_frames.is_outstanding(id) {
                        continue;
                    }
                    if !flusher.send_control_frame(control) {
                        debug!("Connection is write blocked");
                        self.stats.write_blocked_events += 1;
                        return;
                    }
                    self.stats.control_frames_retransmitted += 1;
                }
                Frame::Stream(f) => {
                    let Some(state) = self.streams.get(&f.stream_id) else {
                        continue;
                    };
                    let is_crypto = f.stream_id == crypto_id;

                    let mut retransmission = ByteRangeSet::from_range(f.offset, f.end());
                    let level = if is_crypto {
                        self.crypto_transfers.resolve(&mut retransmission)
                    } else {
                        None
                    };
                    retransmission.difference_set(state.bytes_acked());
                    let mut retransmit_fin = f.fin && state.fin_outstanding();
                    let bytes_sent = state.bytes_sent();

                    for range in retransmission.iter() {
                        let length = range.end - range.start;
                        let fin = retransmit_fin && range.end == bytes_sent;
                        let consumed = {
                            let mut conn = ScopedEncryptionLevel::switch_to(&mut *flusher, level);
                            conn.send_stream_data(f.stream_id, length, range.start, fin)
                        };
                        trace!(
                            stream_id = %f.stream_id,
                            offset = range.start,
                            end = range.end,
                            fin,
                            %consumed,
                            "Forced retransmission of stream data"
                        );
                        if fin {
                            retransmit_fin = !consumed.fin_consumed;
                        }
                        if is_crypto {
                            self.stats.crypto_bytes_retransmitted += consumed.bytes_consumed;
                        } else {
                            self.stats.stream_bytes_retransmitted += consumed.bytes_consumed;
                        }
                        if !consumed.is_complete(length, fin) {
                            debug!("Connection is write blocked");
                            self.stats.write_blocked_events += 1;
                            return;
                        }
                    }

                    if retransmit_fin {
                        debug!(stream_id = %f.stream_id, "Retransmitting fin only frame");
                        let consumed = flusher.send_stream_data(f.stream_id, 0, bytes_sent, true);
                        if !consumed.fin_consumed {
                            debug!("Connection is write blocked");
                            self.stats.write_blocked_events += 1;
                            return;
                        }
                    }
                }
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Check if a frame still carries unacknowledged data, fin or control
    /// frame
    pub fn is_frame_outstanding(&self, frame: &Frame) -> bool {
        match frame {
            Frame::Stream(f) => match self.streams.get(&f.stream_id) {
                Some(state) => state.is_range_outstanding(f.offset, f.data_length, f.fin),
                None => false,
            },
            Frame::Control(c) => self.control_frames.is_outstanding(c.control_frame_id()),
            Frame::Padding { .. } => false,
        }
    }

    /// Check if there is anything at all to send
    pub fn willing_to_write(&self) -> bool {
        let buffered_control = self.has_buffered_control_frames();
        let lost_control = self.has_lost_control_frames();
        let buffered_stream = self.has_buffered_stream_data();
        let lost_stream = self.has_lost_stream_data();
        trace!(
            buffered_control,
            lost_control,
            buffered_stream,
            lost_stream,
            "WillingToWrite"
        );
        buffered_control || lost_control || buffered_stream || lost_stream
    }

    /// Sum of bytes handed to the connection across streams
    pub fn stream_bytes_sent(&self) -> ByteCount {
        self.streams.values().map(StreamState::bytes_sent).sum()
    }

    /// Sum of bytes buffered but never sent across streams
    pub fn stream_bytes_to_send(&self) -> ByteCount {
        self.streams.values().map(StreamState::bytes_to_send).sum()
    }

    /// Check if a stream has sent data or a fin still unacknowledged
    pub fn stream_is_waiting_for_acks(&self, id: StreamId) -> bool {
        self.streams
            .get(&id)
            .map_or(false, StreamState::is_waiting_for_acks)
    }

    /// Check if a stream has new data or an unsent fin
    pub fn stream_has_buffered_data(&self, id: StreamId) -> bool {
        self.streams
            .get(&id)
            .map_or(false, StreamState::has_buffered_data)
    }

    /// Check if any buffered crypto byte is still unacknowledged
    pub fn has_pending_crypto_data(&self) -> bool {
        let Some(state) = self.streams.get(&self.crypto_stream_id()) else {
            return false;
        };
        let mut bytes_to_ack = ByteRangeSet::from_range(0, state.bytes_total());
        bytes_to_ack.difference_set(state.bytes_acked());
        !bytes_to_ack.is_empty()
    }

    /// Check if any stream data or control frame is queued behind a
    /// write-blocked connection
    fn has_buffered_data(&self) -> bool {
        self.has_buffered_stream_data() || self.has_buffered_control_frames()
    }

    pub fn has_buffered_stream_data(&self) -> bool {
        self.streams.values().any(StreamState::has_buffered_data)
    }

    pub fn has_lost_stream_data(&self) -> bool {
        self.streams.values().any(StreamState::has_lost_data)
    }

    /// Check if any stream waits for acknowledgments
    pub fn has_unacked_stream_data(&self) -> bool {
        self.streams.values().any(StreamState::is_waiting_for_acks)
    }

    pub fn has_buffered_control_frames(&self) -> bool {
        self.control_frames.has_buffered()
    }

    pub fn has_lost_control_frames(&self) -> bool {
        self.control_frames.has_lost()
    }
}
