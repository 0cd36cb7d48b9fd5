//! # Session Notifier Tests
//!
//! Drives the notifier against a recording mock connection.
//!
//! ## Test Coverage
//!
//! 1. **Writes** - Immediate sends, queuing under back-pressure, partial consumption
//! 2. **Resets** - Abnormal resets discard stream state
//! 3. **OnCanWrite** - Send priority, back-pressure, crypto level resolution, fins
//! 4. **Acks/Losses** - Idempotence, disjointness, eviction
//! 5. **Control Frames** - Ledger trimming and loss retransmission
//! 6. **RetransmitFrames** - Forced retransmission rules
//! 7. **Queries** - WillingToWrite, byte counters, pending crypto data

#![cfg(test)]

use super::*;
use crate::types::EncryptionLevel::{Handshake, Initial, OneRtt};
use crate::types::TransmissionType::{
    AllInitialRetransmission, AllUnackedRetransmission, HandshakeRetransmission,
    LossRetransmission, NotRetransmission, ProbingRetransmission, RtoRetransmission,
    TlpRetransmission,
};

type Notifier = SessionNotifier<MockConnection>;

const CRYPTO: StreamId = StreamId(1);

/// A send the mock connection accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sent {
    Stream {
        id: StreamId,
        offset: StreamOffset,
        length: ByteCount,
        fin: bool,
        level: EncryptionLevel,
        transmission: Option<TransmissionType>,
    },
    Control {
        id: ControlFrameId,
        name: &'static str,
        transmission: Option<TransmissionType>,
    },
}

#[derive(Debug, Default)]
struct MockConnection {
    level: EncryptionLevel,
    transmission: Option<TransmissionType>,

    /// Sends accepted before becoming write blocked; `None` is unlimited
    send_budget: Option<usize>,

    /// Cap on bytes consumed by a single stream send
    max_bytes_per_send: Option<u64>,

    reject_control_frames: bool,
    reject_fin: bool,

    sent: Vec<Sent>,
    attempts: usize,
    flushes: usize,
}

impl MockConnection {
    fn block(&mut self) {
        self.send_budget = Some(0);
    }

    fn unblock(&mut self) {
        self.send_budget = None;
    }

    fn take_budget(&mut self) -> bool {
        self.attempts += 1;
        match &mut self.send_budget {
            None => true,
            Some(0) => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }
}

impl SessionConnection for MockConnection {
    fn send_stream_data(
        &mut self,
        stream_id: StreamId,
        length: ByteCount,
        offset: StreamOffset,
        fin: bool,
    ) -> ConsumedData {
        if !self.take_budget() {
            return ConsumedData::default();
        }
        let bytes_consumed = length.min(self.max_bytes_per_send.unwrap_or(u64::MAX));
        let fin_consumed = fin && bytes_consumed == length && !self.reject_fin;
        if bytes_consumed > 0 || fin_consumed {
            self.sent.push(Sent::Stream {
                id: stream_id,
                offset,
                length: bytes_consumed,
                fin: fin_consumed,
                level: self.level,
                transmission: self.transmission,
            });
        }
        ConsumedData::new(bytes_consumed, fin_consumed)
    }

    fn send_control_frame(&mut self, frame: &ControlFrame) -> bool {
        if self.reject_control_frames || !self.take_budget() {
            return false;
        }
        self.sent.push(Sent::Control {
            id: frame.control_frame_id(),
            name: frame.name(),
            transmission: self.transmission,
        });
        true
    }

    fn set_transmission_type(&mut self, transmission_type: TransmissionType) {
        self.transmission = Some(transmission_type);
    }

    fn set_default_encryption_level(&mut self, level: EncryptionLevel) {
        self.level = level;
    }

    fn encryption_level(&self) -> EncryptionLevel {
        self.level
    }

    fn flush_packets(&mut self) {
        self.flushes += 1;
    }
}

fn notifier() -> Notifier {
    SessionNotifier::new(MockConnection::default())
}

fn stream(id: u64, offset: StreamOffset, length: ByteCount, fin: bool) -> Frame {
    Frame::Stream(StreamFrame::new(StreamId(id), offset, length, fin))
}

fn control(id: ControlFrameId) -> Frame {
    let mut frame = ControlFrame::ping();
    frame.set_control_frame_id(id);
    Frame::Control(frame)
}

fn sent_stream(
    id: u64,
    offset: StreamOffset,
    length: ByteCount,
    fin: bool,
    level: EncryptionLevel,
    transmission: TransmissionType,
) -> Sent {
    Sent::Stream {
        id: StreamId(id),
        offset,
        length,
        fin,
        level,
        transmission: Some(transmission),
    }
}

fn sent_control(id: ControlFrameId, name: &'static str, transmission: TransmissionType) -> Sent {
    Sent::Control {
        id,
        name,
        transmission: Some(transmission),
    }
}

fn ranges(list: &[(u64, u64)]) -> ByteRangeSet {
    let mut set = ByteRangeSet::new();
    for &(lo, hi) in list {
        set.add(lo, hi);
    }
    set
}

// ============================================================================
// Write Tests
// ============================================================================

mod write_tests {
    use super::*;

    #[test]
    fn test_write_unblocked_sends_everything() {
        let mut n = notifier();
        let consumed = n.write_or_buffer_data(StreamId(5), 100, false);

        assert_eq!(consumed, ConsumedData::new(100, false));
        let state = n.stream_state(StreamId(5)).unwrap();
        assert_eq!(state.bytes_total(), 100);
        assert_eq!(state.bytes_sent(), 100);
        assert_eq!(n.stream_bytes_sent(), 100);
        assert_eq!(
            n.connection().sent,
            vec![sent_stream(5, 0, 100, false, Initial, NotRetransmission)]
        );
    }

    #[test]
    fn test_write_with_fin() {
        let mut n = notifier();
        let consumed = n.write_or_buffer_data(StreamId(5), 10, true);

        assert_eq!(consumed, ConsumedData::new(10, true));
        let state = n.stream_state(StreamId(5)).unwrap();
        assert!(state.fin_sent());
        assert!(state.fin_outstanding());
        assert!(n.stream_is_waiting_for_acks(StreamId(5)));
    }

    #[test]
    fn test_write_while_buffered_is_queued() {
        let mut n = notifier();
        n.connection_mut().block();
        let first = n.write_or_buffer_data(StreamId(5), 10, false);
        assert_eq!(first, ConsumedData::default());
        assert_eq!(n.connection().attempts, 1);

        // Stream 5 is backlogged; stream 7 must not even be attempted.
        n.connection_mut().unblock();
        let second = n.write_or_buffer_data(StreamId(7), 20, false);
        assert_eq!(second, ConsumedData::default());
        assert_eq!(n.connection().attempts, 1);
        assert!(n.connection().sent.is_empty());
        assert_eq!(n.stream_bytes_to_send(), 30);

        n.on_can_write();
        assert_eq!(
            n.connection().sent,
            vec![
                sent_stream(5, 0, 10, false, Initial, NotRetransmission),
                sent_stream(7, 0, 20, false, Initial, NotRetransmission),
            ]
        );
        assert!(!n.willing_to_write());
    }

    #[test]
    fn test_partial_consumption_keeps_remainder() {
        let mut n = notifier();
        n.connection_mut().max_bytes_per_send = Some(40);
        let consumed = n.write_or_buffer_data(StreamId(5), 100, true);

        assert_eq!(consumed, ConsumedData::new(40, false));
        assert_eq!(n.stream_bytes_sent(), 40);
        assert_eq!(n.stream_bytes_to_send(), 60);
        assert!(n.stream_has_buffered_data(StreamId(5)));

        n.connection_mut().max_bytes_per_send = None;
        n.on_can_write();
        assert_eq!(
            n.connection().sent.last(),
            Some(&sent_stream(5, 40, 60, true, Initial, NotRetransmission))
        );
        assert!(!n.stream_has_buffered_data(StreamId(5)));
    }

    #[test]
    fn test_fin_only_write_after_data() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 10, false);
        let consumed = n.write_or_buffer_data(StreamId(5), 0, true);

        assert_eq!(consumed, ConsumedData::new(0, true));
        assert_eq!(
            n.connection().sent.last(),
            Some(&sent_stream(5, 10, 0, true, Initial, NotRetransmission))
        );
    }

    #[test]
    fn test_empty_write_sends_nothing() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 10, true);
        let attempts = n.connection().attempts;

        let consumed = n.write_or_buffer_data(StreamId(5), 0, false);
        assert_eq!(consumed, ConsumedData::default());
        assert_eq!(n.connection().attempts, attempts);
    }

    #[test]
    fn test_crypto_data_recorded_at_current_level() {
        let mut n = notifier();
        n.write_or_buffer_data(CRYPTO, 100, false);
        n.connection_mut().level = Handshake;
        n.write_or_buffer_data(CRYPTO, 50, false);
        n.write_or_buffer_data(StreamId(5), 10, false);

        let record = n.crypto_transfers();
        assert_eq!(record.transferred_at(Initial), &ranges(&[(0, 100)]));
        assert_eq!(record.transferred_at(Handshake), &ranges(&[(100, 150)]));
        assert!(record.transferred_at(OneRtt).is_empty());
    }
}

// ============================================================================
// Reset Tests
// ============================================================================

mod rst_stream_tests {
    use super::*;

    #[test]
    fn test_abnormal_reset_discards_stream() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, false);
        let code = RstStreamErrorCode::StreamCancelled;
        let id = n.write_or_buffer_rst_stream(StreamId(5), code, 100);

        assert_eq!(id, 1);
        assert!(n.stream_state(StreamId(5)).is_none());
        assert_eq!(
            n.connection().sent.last(),
            Some(&sent_control(1, "RESET_STREAM", NotRetransmission))
        );

        // Late loss and ack reports for the reset stream are ignored.
        n.on_frame_lost(&stream(5, 0, 100, false));
        assert!(!n.on_frame_acked(&stream(5, 0, 100, false), Duration::ZERO));
        assert!(!n.willing_to_write());
        assert!(!n.stream_is_waiting_for_acks(StreamId(5)));
    }

    #[test]
    fn test_normal_reset_keeps_stream() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, true);
        n.write_or_buffer_rst_stream(StreamId(5), RstStreamErrorCode::NoError, 100);

        assert!(n.stream_state(StreamId(5)).is_some());
        assert!(n.stream_is_waiting_for_acks(StreamId(5)));
    }

    #[test]
    fn test_reset_queued_while_blocked() {
        let mut n = notifier();
        n.connection_mut().block();
        n.write_or_buffer_data(StreamId(5), 10, false);
        n.write_or_buffer_rst_stream(StreamId(7), RstStreamErrorCode::PeerGoingAway, 0);

        assert!(n.has_buffered_control_frames());
        assert!(n.connection().sent.is_empty());

        n.connection_mut().unblock();
        n.on_can_write();
        assert_eq!(
            n.connection().sent,
            vec![
                sent_control(1, "RESET_STREAM", NotRetransmission),
                sent_stream(5, 0, 10, false, Initial, NotRetransmission),
            ]
        );
    }

    #[test]
    fn test_rejected_reset_stays_buffered() {
        let mut n = notifier();
        n.connection_mut().reject_control_frames = true;
        n.write_or_buffer_rst_stream(StreamId(5), RstStreamErrorCode::StreamCancelled, 0);

        assert!(n.has_buffered_control_frames());
        assert!(n.willing_to_write());
        assert_eq!(n.stats().write_blocked_events, 1);
    }
}

// ============================================================================
// OnCanWrite Tests
// ============================================================================

mod on_can_write_tests {
    use super::*;

    /// Lost crypto data, a lost PING, lost data on stream 5, a buffered
    /// MAX_DATA and new data on stream 7, all pending at once.
    fn notifier_with_everything_pending() -> (Notifier, ControlFrameId, ControlFrameId) {
        let mut n = notifier();
        n.write_or_buffer_data(CRYPTO, 10, false);
        n.connection_mut().level = OneRtt;
        let ping = n.write_or_buffer_ping();
        n.write_or_buffer_data(StreamId(5), 10, false);

        n.on_frame_lost(&stream(1, 0, 10, false));
        n.on_frame_lost(&control(ping));
        n.on_frame_lost(&stream(5, 0, 10, false));

        n.connection_mut().block();
        n.write_or_buffer_data(StreamId(7), 10, false);
        let max_data = n.write_or_buffer_control_frame(ControlFrame::max_data(1_000));
        n.connection_mut().unblock();
        n.connection_mut().sent.clear();
        (n, ping, max_data)
    }

    #[test]
    fn test_priority_ordering() {
        let (mut n, ping, max_data) = notifier_with_everything_pending();
        n.on_can_write();

        assert_eq!(
            n.connection().sent,
            vec![
                sent_stream(1, 0, 10, false, Initial, HandshakeRetransmission),
                sent_control(ping, "PING", LossRetransmission),
                sent_stream(5, 0, 10, false, OneRtt, LossRetransmission),
                sent_control(max_data, "MAX_DATA", NotRetransmission),
                sent_stream(7, 0, 10, false, OneRtt, NotRetransmission),
            ]
        );
        assert_eq!(n.connection().level, OneRtt);
        assert!(!n.willing_to_write());
    }

    #[test]
    fn test_one_unit_per_call_sends_crypto_first() {
        let (mut n, _, _) = notifier_with_everything_pending();
        n.connection_mut().max_bytes_per_send = Some(1);
        n.on_can_write();

        let expected = sent_stream(1, 0, 1, false, Initial, HandshakeRetransmission);
        assert_eq!(n.connection().sent, vec![expected]);
        assert!(n.has_pending_crypto_data());
        assert!(n.has_lost_control_frames());
        assert_eq!(n.connection().level, OneRtt);
    }

    #[test]
    fn test_single_send_budget_stops_after_crypto() {
        let (mut n, _, _) = notifier_with_everything_pending();
        n.connection_mut().send_budget = Some(1);
        n.on_can_write();

        assert_eq!(n.connection().sent.len(), 1);
        let first = n.connection().sent[0];
        assert!(matches!(first, Sent::Stream { id: CRYPTO, .. }));
        assert!(n.has_lost_control_frames());
        assert!(n.has_lost_stream_data());
        assert!(n.has_buffered_stream_data());
    }

    #[test]
    fn test_rejected_control_frame_blocks_stream_data() {
        let mut n = notifier();
        let ping = n.write_or_buffer_ping();
        n.write_or_buffer_data(StreamId(5), 10, false);
        n.on_frame_lost(&control(ping));
        n.on_frame_lost(&stream(5, 0, 10, false));

        n.connection_mut().block();
        n.write_or_buffer_data(StreamId(7), 10, false);
        n.connection_mut().unblock();
        n.connection_mut().reject_control_frames = true;
        n.connection_mut().sent.clear();

        n.on_can_write();
        assert!(n.connection().sent.is_empty());
        assert!(n.has_lost_stream_data());
        assert!(n.stream_has_buffered_data(StreamId(7)));
    }

    #[test]
    fn test_crypto_retransmitted_at_original_levels() {
        let mut n = notifier();
        n.write_or_buffer_data(CRYPTO, 100, false);
        n.connection_mut().level = Handshake;
        n.write_or_buffer_data(CRYPTO, 50, false);
        n.connection_mut().level = OneRtt;
        n.on_frame_lost(&stream(1, 50, 100, false));
        n.connection_mut().sent.clear();

        n.on_can_write();
        assert_eq!(
            n.connection().sent,
            vec![
                sent_stream(1, 50, 50, false, Initial, HandshakeRetransmission),
                sent_stream(1, 100, 50, false, Handshake, HandshakeRetransmission),
            ]
        );
        assert_eq!(n.connection().level, OneRtt);
        assert!(!n.has_lost_stream_data());
    }

    #[test]
    fn test_blocked_crypto_retransmission_restores_level() {
        let mut n = notifier();
        n.write_or_buffer_data(CRYPTO, 100, false);
        n.connection_mut().level = OneRtt;
        n.on_frame_lost(&stream(1, 0, 100, false));
        n.connection_mut().max_bytes_per_send = Some(30);
        n.connection_mut().sent.clear();

        n.on_can_write();
        assert_eq!(n.connection().sent.len(), 1);
        assert_eq!(n.connection().level, OneRtt);
        assert_eq!(
            n.stream_state(CRYPTO).unwrap().pending_retransmissions(),
            &ranges(&[(30, 100)])
        );
        assert_eq!(n.stats().crypto_bytes_retransmitted, 30);
    }

    #[test]
    fn test_lost_fin_bundled_with_last_range() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, true);
        n.on_frame_lost(&stream(5, 50, 50, true));
        n.connection_mut().sent.clear();

        n.on_can_write();
        assert_eq!(
            n.connection().sent,
            vec![sent_stream(5, 50, 50, true, Initial, LossRetransmission)]
        );
        let state = n.stream_state(StreamId(5)).unwrap();
        assert!(!state.fin_lost());
        assert!(!state.has_lost_data());
    }

    #[test]
    fn test_lost_fin_not_bundled_with_middle_range() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, true);
        n.on_frame_acked(&stream(5, 50, 50, false), Duration::ZERO);
        n.on_frame_lost(&stream(5, 0, 50, false));
        n.on_frame_lost(&stream(5, 100, 0, true));
        n.connection_mut().sent.clear();

        n.on_can_write();
        assert_eq!(
            n.connection().sent,
            vec![
                sent_stream(5, 0, 50, false, Initial, LossRetransmission),
                sent_stream(5, 100, 0, true, Initial, LossRetransmission),
            ]
        );
        assert!(!n.has_lost_stream_data());
    }

    #[test]
    fn test_fin_only_retransmission() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, true);
        assert!(n.on_frame_acked(&stream(5, 0, 100, false), Duration::ZERO));
        n.on_frame_lost(&stream(5, 100, 0, true));
        assert!(n.has_lost_stream_data());
        n.connection_mut().sent.clear();

        n.on_can_write();
        assert_eq!(
            n.connection().sent,
            vec![sent_stream(5, 100, 0, true, Initial, LossRetransmission)]
        );
        assert!(!n.has_lost_stream_data());
    }

    #[test]
    fn test_rejected_fin_stays_lost() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, true);
        n.on_frame_acked(&stream(5, 0, 100, false), Duration::ZERO);
        n.on_frame_lost(&stream(5, 100, 0, true));
        n.connection_mut().reject_fin = true;

        n.on_can_write();
        assert!(n.stream_state(StreamId(5)).unwrap().fin_lost());
        assert!(n.willing_to_write());
        assert_eq!(n.stats().write_blocked_events, 1);
    }

    #[test]
    fn test_lost_streams_visited_in_id_order() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(9), 10, false);
        n.write_or_buffer_data(StreamId(5), 10, false);
        n.on_frame_lost(&stream(9, 0, 10, false));
        n.on_frame_lost(&stream(5, 0, 10, false));
        n.connection_mut().sent.clear();

        n.on_can_write();
        let ids: Vec<StreamId> = n
            .connection()
            .sent
            .iter()
            .filter_map(|sent| match sent {
                Sent::Stream { id, .. } => Some(*id),
                Sent::Control { .. } => None,
            })
            .collect();
        assert_eq!(ids, vec![StreamId(5), StreamId(9)]);
    }

    #[test]
    fn test_nothing_to_do() {
        let mut n = notifier();
        n.on_can_write();
        assert_eq!(n.connection().attempts, 0);
    }
}

// ============================================================================
// Ack / Loss Tests
// ============================================================================

mod ack_loss_tests {
    use super::*;

    #[test]
    fn test_idempotent_ack() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, false);

        assert!(n.on_frame_acked(&stream(5, 0, 50, false), Duration::ZERO));
        let acked = n.stream_state(StreamId(5)).unwrap().bytes_acked().clone();
        assert!(!n.on_frame_acked(&stream(5, 0, 50, false), Duration::ZERO));
        assert_eq!(n.stream_state(StreamId(5)).unwrap().bytes_acked(), &acked);
    }

    #[test]
    fn test_ack_then_loss_leaves_unacked_ranges() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, false);

        n.on_frame_acked(&stream(5, 20, 30, false), Duration::ZERO);
        n.on_frame_lost(&stream(5, 0, 100, false));

        let state = n.stream_state(StreamId(5)).unwrap();
        assert_eq!(state.bytes_acked(), &ranges(&[(20, 50)]));
        assert_eq!(
            state.pending_retransmissions(),
            &ranges(&[(0, 20), (50, 100)])
        );
    }

    #[test]
    fn test_ack_clears_pending_retransmission() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, false);
        n.on_frame_lost(&stream(5, 0, 100, false));

        // A late ack for a frame already declared lost.
        assert!(n.on_frame_acked(&stream(5, 0, 60, false), Duration::ZERO));
        let state = n.stream_state(StreamId(5)).unwrap();
        assert_eq!(state.pending_retransmissions(), &ranges(&[(60, 100)]));
    }

    #[test]
    fn test_acked_and_pending_stay_disjoint() {
        use proptest::prelude::*;

        let event = (any::<bool>(), 0u64..1_000, 0u64..400, any::<bool>());
        proptest!(|(events in prop::collection::vec(event, 1..40))| {
            let mut n = notifier();
            n.write_or_buffer_data(StreamId(5), 1_000, true);

            for (ack, offset, length, fin) in events {
                let length = length.min(1_000 - offset);
                let frame = stream(5, offset, length, fin && offset + length == 1_000);
                if ack {
                    n.on_frame_acked(&frame, Duration::ZERO);
                    assert!(!n.on_frame_acked(&frame, Duration::ZERO), "second ack of {}", frame);
                } else {
                    n.on_frame_lost(&frame);
                }

                let state = n.stream_state(StreamId(5)).unwrap();
                let mut overlap = state.pending_retransmissions().clone();
                overlap.intersection(state.bytes_acked());
                assert!(overlap.is_empty(), "overlap after {}: {}", frame, state);

                let sent = ByteRangeSet::from_range(0, state.bytes_sent());
                let tracked = state.pending_retransmissions().iter().chain(state.bytes_acked());
                for range in tracked {
                    assert!(sent.contains(range.start, range.end), "{:?} never sent", range);
                }
            }
        });
    }

    #[test]
    fn test_unknown_stream_is_ignored() {
        let mut n = notifier();
        assert!(!n.on_frame_acked(&stream(42, 0, 10, true), Duration::ZERO));
        n.on_frame_lost(&stream(42, 0, 10, true));
        assert!(n.stream_state(StreamId(42)).is_none());
        assert!(!n.willing_to_write());
    }

    #[test]
    fn test_fin_ack() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 10, true);

        assert!(n.on_frame_acked(&stream(5, 0, 10, false), Duration::ZERO));
        assert!(n.stream_is_waiting_for_acks(StreamId(5)));
        assert!(n.on_frame_acked(&stream(5, 10, 0, true), Duration::ZERO));
        assert!(!n.stream_is_waiting_for_acks(StreamId(5)));
        assert!(!n.on_frame_acked(&stream(5, 0, 10, true), Duration::ZERO));
    }

    #[test]
    fn test_loss_of_acked_fin_is_ignored() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 10, true);
        n.on_frame_acked(&stream(5, 0, 10, true), Duration::ZERO);
        n.on_frame_lost(&stream(5, 0, 10, true));

        assert!(!n.stream_state(StreamId(5)).unwrap().fin_lost());
        assert!(!n.has_lost_stream_data());
    }

    #[test]
    fn test_padding_is_never_acked() {
        let mut n = notifier();
        let padding = Frame::Padding { num_bytes: 10 };
        assert!(!n.on_frame_acked(&padding, Duration::ZERO));
        n.on_frame_lost(&padding);
        assert!(!n.willing_to_write());
    }

    #[test]
    fn test_streams_kept_after_full_ack_by_default() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 10, true);
        n.on_frame_acked(&stream(5, 0, 10, true), Duration::ZERO);

        assert!(n.stream_state(StreamId(5)).is_some());
        assert!(!n.stream_is_waiting_for_acks(StreamId(5)));
    }

    #[test]
    fn test_fully_acked_streams_evicted_when_enabled() {
        let config = NotifierConfig {
            evict_acked_streams: true,
            ..NotifierConfig::default()
        };
        let mut n = SessionNotifier::with_config(MockConnection::default(), config);
        n.write_or_buffer_data(StreamId(5), 10, true);
        n.write_or_buffer_data(StreamId(7), 10, false);

        n.on_frame_acked(&stream(5, 0, 5, false), Duration::ZERO);
        assert!(n.stream_state(StreamId(5)).is_some());
        n.on_frame_acked(&stream(5, 5, 5, true), Duration::ZERO);
        assert!(n.stream_state(StreamId(5)).is_none());

        // No fin yet, so stream 7 is not finished.
        n.on_frame_acked(&stream(7, 0, 10, false), Duration::ZERO);
        assert!(n.stream_state(StreamId(7)).is_some());
    }

    #[test]
    fn test_crypto_stream_never_evicted() {
        let config = NotifierConfig {
            evict_acked_streams: true,
            ..NotifierConfig::default()
        };
        let mut n = SessionNotifier::with_config(MockConnection::default(), config);
        n.write_or_buffer_data(CRYPTO, 10, true);
        n.on_frame_acked(&stream(1, 0, 10, true), Duration::ZERO);

        assert!(n.stream_state(CRYPTO).is_some());
    }
}

// ============================================================================
// Control Frame Tests
// ============================================================================

mod control_frame_tests {
    use super::*;

    #[test]
    fn test_trimming_blocked_by_unacked_predecessor() {
        let mut n = notifier();
        let first = n.write_or_buffer_ping();
        let second = n.write_or_buffer_control_frame(ControlFrame::max_data(10_000));
        assert_eq!((first, second), (1, 2));

        assert!(n.on_frame_acked(&control(second), Duration::ZERO));
        assert_eq!(n.control_frames().least_unacked(), 1);
        assert!(n.is_frame_outstanding(&control(first)));
        assert!(!n.is_frame_outstanding(&control(second)));

        assert!(n.on_frame_acked(&control(first), Duration::ZERO));
        assert_eq!(n.control_frames().least_unacked(), 3);
        assert!(!n.on_frame_acked(&control(first), Duration::ZERO));
        assert_eq!(n.control_frames().least_unacked(), 3);
    }

    #[test]
    fn test_lost_control_frame_retransmitted_once() {
        let mut n = notifier();
        let ping = n.write_or_buffer_ping();
        n.on_frame_lost(&control(ping));
        n.on_frame_lost(&control(ping));
        n.connection_mut().sent.clear();

        n.on_can_write();
        assert_eq!(
            n.connection().sent,
            vec![sent_control(ping, "PING", LossRetransmission)]
        );
        assert!(!n.has_lost_control_frames());
        assert_eq!(n.stats().control_frames_retransmitted, 1);
    }

    #[test]
    fn test_acked_before_retransmission_is_not_resent() {
        let mut n = notifier();
        let ping = n.write_or_buffer_ping();
        n.on_frame_lost(&control(ping));
        assert!(n.willing_to_write());
        assert!(n.on_frame_acked(&control(ping), Duration::ZERO));
        n.connection_mut().sent.clear();

        assert!(!n.willing_to_write());
        n.on_can_write();
        assert!(n.connection().sent.is_empty());
    }

    #[test]
    fn test_rejected_lost_frame_stays_lost() {
        let mut n = notifier();
        let ping = n.write_or_buffer_ping();
        n.on_frame_lost(&control(ping));
        n.connection_mut().reject_control_frames = true;

        n.on_can_write();
        assert!(n.has_lost_control_frames());
        let lost: Vec<_> = n.control_frames().lost_ids().collect();
        assert_eq!(lost, vec![ping]);
    }

    #[test]
    fn test_buffered_control_frames_sent_in_order() {
        let mut n = notifier();
        n.connection_mut().block();
        n.write_or_buffer_control_frame(ControlFrame::max_data(1));
        n.write_or_buffer_control_frame(ControlFrame::stream_data_blocked(StreamId(5), 2));
        let stop = ControlFrame::stop_sending(StreamId(5), RstStreamErrorCode::NoError);
        n.write_or_buffer_control_frame(stop);
        n.connection_mut().unblock();

        n.on_can_write();
        let names: Vec<&str> = n
            .connection()
            .sent
            .iter()
            .filter_map(|sent| match sent {
                Sent::Control { name, .. } => Some(*name),
                Sent::Stream { .. } => None,
            })
            .collect();
        assert_eq!(names, ["MAX_DATA", "STREAM_DATA_BLOCKED", "STOP_SENDING"]);
        assert_eq!(n.control_frames().least_unsent(), 4);
    }
}

// ============================================================================
// RetransmitFrames Tests
// ============================================================================

mod retransmit_frames_tests {
    use super::*;

    #[test]
    fn test_only_unacked_bytes_resent() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, true);
        n.on_frame_acked(&stream(5, 40, 20, false), Duration::ZERO);
        n.connection_mut().sent.clear();

        n.retransmit_frames(&[stream(5, 0, 100, true)], RtoRetransmission);
        assert_eq!(
            n.connection().sent,
            vec![
                sent_stream(5, 0, 40, false, Initial, RtoRetransmission),
                sent_stream(5, 60, 40, true, Initial, RtoRetransmission),
            ]
        );
        assert_eq!(n.connection().flushes, 1);
        assert_eq!(n.stats().stream_bytes_retransmitted, 80);
    }

    #[test]
    fn test_crypto_resent_at_original_level() {
        let mut n = notifier();
        n.write_or_buffer_data(CRYPTO, 100, false);
        n.connection_mut().level = OneRtt;
        n.connection_mut().sent.clear();

        n.retransmit_frames(&[stream(1, 0, 100, false)], AllInitialRetransmission);
        let expected = sent_stream(1, 0, 100, false, Initial, AllInitialRetransmission);
        assert_eq!(n.connection().sent, vec![expected]);
        assert_eq!(n.connection().level, OneRtt);
    }

    #[test]
    fn test_acked_control_frames_skipped() {
        let mut n = notifier();
        let first = n.write_or_buffer_ping();
        let second = n.write_or_buffer_ping();
        n.on_frame_acked(&control(first), Duration::ZERO);
        n.connection_mut().sent.clear();

        let padding = Frame::Padding { num_bytes: 3 };
        let frames = [control(first), padding, control(second)];
        n.retransmit_frames(&frames, TlpRetransmission);
        assert_eq!(
            n.connection().sent,
            vec![sent_control(second, "PING", TlpRetransmission)]
        );
    }

    #[test]
    fn test_fin_only_tail() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, true);
        n.on_frame_acked(&stream(5, 0, 100, false), Duration::ZERO);
        n.connection_mut().sent.clear();

        n.retransmit_frames(&[stream(5, 0, 100, true)], ProbingRetransmission);
        assert_eq!(
            n.connection().sent,
            vec![sent_stream(5, 100, 0, true, Initial, ProbingRetransmission)]
        );
    }

    #[test]
    fn test_stops_at_first_blocked_frame() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, false);
        let ping = n.write_or_buffer_ping();
        n.connection_mut().max_bytes_per_send = Some(10);
        n.connection_mut().sent.clear();

        let frames = [stream(5, 0, 100, false), control(ping)];
        n.retransmit_frames(&frames, AllUnackedRetransmission);
        let expected = sent_stream(5, 0, 10, false, Initial, AllUnackedRetransmission);
        assert_eq!(n.connection().sent, vec![expected]);
        assert_eq!(n.connection().flushes, 1);
        assert_eq!(n.stats().write_blocked_events, 1);
    }

    #[test]
    fn test_unknown_stream_skipped() {
        let mut n = notifier();
        let ping = n.write_or_buffer_ping();
        n.connection_mut().sent.clear();

        let frames = [stream(9, 0, 10, true), control(ping)];
        n.retransmit_frames(&frames, RtoRetransmission);
        assert_eq!(
            n.connection().sent,
            vec![sent_control(ping, "PING", RtoRetransmission)]
        );
    }

    #[test]
    fn test_pending_retransmissions_untouched() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, false);
        n.on_frame_lost(&stream(5, 0, 100, false));

        n.retransmit_frames(&[stream(5, 0, 100, false)], RtoRetransmission);
        assert!(n.has_lost_stream_data());
    }
}

// ============================================================================
// Query Tests
// ============================================================================

mod query_tests {
    use super::*;

    #[test]
    fn test_willing_to_write() {
        let mut n = notifier();
        assert!(!n.willing_to_write());

        n.write_or_buffer_data(StreamId(5), 10, false);
        assert!(!n.willing_to_write());

        n.on_frame_lost(&stream(5, 0, 10, false));
        assert!(n.willing_to_write());
        n.on_can_write();
        assert!(!n.willing_to_write());

        n.connection_mut().reject_control_frames = true;
        n.write_or_buffer_ping();
        assert!(n.willing_to_write());
    }

    #[test]
    fn test_byte_counters() {
        let mut n = notifier();
        n.connection_mut().max_bytes_per_send = Some(40);
        n.write_or_buffer_data(StreamId(5), 100, false);
        n.write_or_buffer_data(StreamId(7), 10, false);

        assert_eq!(n.stream_bytes_sent(), 40);
        assert_eq!(n.stream_bytes_to_send(), 70);
        assert!(n.has_buffered_stream_data());
        assert!(!n.stream_has_buffered_data(StreamId(9)));
    }

    #[test]
    fn test_pending_crypto_data() {
        let mut n = notifier();
        assert!(!n.has_pending_crypto_data());

        n.write_or_buffer_data(CRYPTO, 100, false);
        assert!(n.has_pending_crypto_data());
        n.on_frame_acked(&stream(1, 0, 60, false), Duration::ZERO);
        assert!(n.has_pending_crypto_data());
        n.on_frame_acked(&stream(1, 60, 40, false), Duration::ZERO);
        assert!(!n.has_pending_crypto_data());
    }

    #[test]
    fn test_unsent_crypto_data_is_pending() {
        let mut n = notifier();
        n.connection_mut().block();
        n.write_or_buffer_data(CRYPTO, 10, false);
        assert!(n.has_pending_crypto_data());
    }

    #[test]
    fn test_neuter_unencrypted_data() {
        let mut n = notifier();
        n.write_or_buffer_data(CRYPTO, 100, false);
        n.connection_mut().level = Handshake;
        n.write_or_buffer_data(CRYPTO, 50, false);
        n.on_frame_lost(&stream(1, 0, 150, false));

        n.neuter_unencrypted_data();
        let state = n.stream_state(CRYPTO).unwrap();
        assert_eq!(state.bytes_acked(), &ranges(&[(0, 100)]));
        assert_eq!(state.pending_retransmissions(), &ranges(&[(100, 150)]));
        assert!(n.has_pending_crypto_data());
    }

    #[test]
    fn test_frame_outstanding() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, true);
        n.on_frame_acked(&stream(5, 0, 50, false), Duration::ZERO);

        assert!(!n.is_frame_outstanding(&stream(5, 0, 50, false)));
        assert!(n.is_frame_outstanding(&stream(5, 40, 20, false)));
        assert!(n.is_frame_outstanding(&stream(5, 100, 0, true)));
        assert!(!n.is_frame_outstanding(&stream(9, 0, 10, false)));
        assert!(!n.is_frame_outstanding(&Frame::Padding { num_bytes: 1 }));

        n.on_frame_acked(&stream(5, 50, 50, true), Duration::ZERO);
        assert!(!n.is_frame_outstanding(&stream(5, 0, 100, true)));

        let ping = n.write_or_buffer_ping();
        assert!(n.is_frame_outstanding(&control(ping)));
        n.on_frame_acked(&control(ping), Duration::ZERO);
        assert!(!n.is_frame_outstanding(&control(ping)));
    }

    #[test]
    fn test_unacked_stream_data() {
        let mut n = notifier();
        assert!(!n.has_unacked_stream_data());
        n.write_or_buffer_data(StreamId(5), 10, false);
        assert!(n.has_unacked_stream_data());
        n.on_frame_acked(&stream(5, 0, 10, false), Duration::ZERO);
        assert!(!n.has_unacked_stream_data());
    }

    #[test]
    fn test_stats_accumulate() {
        let mut n = notifier();
        n.write_or_buffer_data(StreamId(5), 100, false);
        n.write_or_buffer_ping();
        n.on_frame_lost(&stream(5, 0, 30, false));
        n.on_can_write();

        let stats = *n.stats();
        assert_eq!(stats.stream_bytes_sent, 100);
        assert_eq!(stats.stream_bytes_retransmitted, 30);
        assert_eq!(stats.control_frames_sent, 1);
        assert_eq!(stats.control_frames_retransmitted, 0);
        assert_eq!(stats.write_blocked_events, 0);
    }
}
