//! Retransmittable control frame bookkeeping.

pub mod ledger;

pub use ledger::ControlFrameLedger;
