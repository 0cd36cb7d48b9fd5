//! # Frame Descriptors (RFC 9000 Section 19)
//!
//! Stream and control frame descriptors exchanged between the notifier and
//! the connection. Payload bytes stay with the connection.

pub mod types;

pub use types::*;
