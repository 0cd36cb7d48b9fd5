//! # Stream Send State (RFC 9000 Section 2, 3)
//!
//! Per-stream delivery bookkeeping and the crypto stream's per-level
//! transfer record.

pub mod crypto;
pub mod state;

pub use crypto::CryptoTransferMap;
pub use state::StreamState;

pub use crate::types::StreamId;
