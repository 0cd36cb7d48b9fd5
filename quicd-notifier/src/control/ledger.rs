//! # Control Frame Ledger
//!
//! Ordered, append-only log of retransmittable control frames.
//!
//! ## Layout
//!
//! ```text
//!   least_unacked        least_unsent
//!        │                    │
//!        ▼                    ▼
//!      ┌────┬────┬────┬────┬────┬────┐
//!      │ 4  │ ∅  │ 6  │ 7  │ 8  │ 9  │   ∅ = acked (id cleared)
//!      └────┴────┴────┴────┴────┴────┘
//!      ◀──── sent ────────▶◀ buffered ▶
//! ```
//!
//! The entry for id `n` lives at index `n - least_unacked`. Acknowledging an
//! entry clears its id; cleared entries at the head are trimmed, advancing
//! `least_unacked`. Each entry is trimmed at most once, so trimming is
//! amortized O(1).

#![forbid(unsafe_code)]

use crate::frames::ControlFrame;
use crate::types::{ControlFrameId, INVALID_CONTROL_FRAME_ID};
use std::collections::{BTreeSet, VecDeque};

/// Outstanding control frames, keyed by a monotonically increasing id.
#[derive(Debug, Clone)]
pub struct ControlFrameLedger {
    /// Frames from `least_unacked` onwards
    frames: VecDeque<ControlFrame>,

    /// Last id handed out
    last_control_frame_id: ControlFrameId,

    /// Id of the frame at the head of `frames`
    least_unacked: ControlFrameId,

    /// Id of the first frame never handed to the connection
    least_unsent: ControlFrameId,

    /// Sent frames declared lost, in ascending id order
    lost: BTreeSet<ControlFrameId>,
}

impl Default for ControlFrameLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlFrameLedger {
    /// Create an empty ledger; the first assigned id is 1
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            last_control_frame_id: INVALID_CONTROL_FRAME_ID,
            least_unacked: 1,
            least_unsent: 1,
            lost: BTreeSet::new(),
        }
    }

    /// Append a frame, assigning it the next id
    pub fn append(&mut self, mut frame: ControlFrame) -> ControlFrameId {
        self.last_control_frame_id += 1;
        let id = self.last_control_frame_id;
        frame.set_control_frame_id(id);
        self.frames.push_back(frame);
        id
    }

    pub fn least_unacked(&self) -> ControlFrameId {
        self.least_unacked
    }

    pub fn least_unsent(&self) -> ControlFrameId {
        self.least_unsent
    }

    /// Number of entries still held (acked entries behind an unacked head included)
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// One past the highest id in the ledger
    fn end(&self) -> ControlFrameId {
        self.least_unacked + self.frames.len() as ControlFrameId
    }

    /// Entry for `id`, if it is inside the live window
    fn entry(&self, id: ControlFrameId) -> Option<&ControlFrame> {
        if id < self.least_unacked || id >= self.end() {
            return None;
        }
        self.frames.get((id - self.least_unacked) as usize)
    }

    fn entry_mut(&mut self, id: ControlFrameId) -> Option<&mut ControlFrame> {
        if id < self.least_unacked || id >= self.end() {
            return None;
        }
        self.frames.get_mut((id - self.least_unacked) as usize)
    }

    /// Acknowledged entries have their id cleared
    fn is_acked(frame: &ControlFrame) -> bool {
        frame.control_frame_id() == INVALID_CONTROL_FRAME_ID
    }

    /// Check if `id` is in the ledger and not yet acknowledged
    pub fn is_outstanding(&self, id: ControlFrameId) -> bool {
        if id == INVALID_CONTROL_FRAME_ID {
            return false;
        }
        self.entry(id).is_some_and(|frame| !Self::is_acked(frame))
    }

    /// Record an acknowledgment.
    ///
    /// Returns `false` for the invalid id, for ids already trimmed and for
    /// entries already acknowledged.
    pub fn on_acked(&mut self, id: ControlFrameId) -> bool {
        if id == INVALID_CONTROL_FRAME_ID {
            return false;
        }
        debug_assert!(id < self.end(), "acked control frame {} never appended", id);
        let Some(frame) = self.entry_mut(id) else {
            return false;
        };
        if Self::is_acked(frame) {
            return false;
        }

        frame.set_control_frame_id(INVALID_CONTROL_FRAME_ID);
        self.lost.remove(&id);
        while self.frames.front().is_some_and(Self::is_acked) {
            self.frames.pop_front();
            self.least_unacked += 1;
        }
        self.least_unsent = self.least_unsent.max(self.least_unacked);
        true
    }

    /// Record a loss. Duplicate and stale notifications are ignored.
    pub fn on_lost(&mut self, id: ControlFrameId) {
        if id == INVALID_CONTROL_FRAME_ID {
            return;
        }
        debug_assert!(id < self.end(), "lost control frame {} never appended", id);
        if self.is_outstanding(id) {
            self.lost.insert(id);
        }
    }

    /// Check if frames were appended but never sent
    pub fn has_buffered(&self) -> bool {
        self.least_unsent < self.end()
    }

    /// Check if any sent frame awaits retransmission
    pub fn has_lost(&self) -> bool {
        !self.lost.is_empty()
    }

    /// Ids currently marked lost, ascending
    pub fn lost_ids(&self) -> impl Iterator<Item = ControlFrameId> + '_ {
        self.lost.iter().copied()
    }

    /// First frame never handed to the connection
    pub fn next_unsent(&self) -> Option<&ControlFrame> {
        if !self.has_buffered() {
            return None;
        }
        self.entry(self.least_unsent)
    }

    /// Advance past the frame returned by [`next_unsent`](Self::next_unsent)
    pub fn mark_sent(&mut self) {
        debug_assert!(self.has_buffered());
        if self.has_buffered() {
            self.least_unsent += 1;
        }
    }

    /// Lost frame with the lowest id
    pub fn first_lost(&self) -> Option<&ControlFrame> {
        let id = *self.lost.iter().next()?;
        self.entry(id)
    }

    /// Forget the lost frame with the lowest id after it was resent
    pub fn pop_first_lost(&mut self) -> Option<ControlFrameId> {
        self.lost.pop_first()
    }
}
