//! # Connection Collaborator Interface
//!
//! The notifier decides *what* to send and *when*; the connection decides
//! *how*. This module defines the seam between the two plus scoped guards
//! over the connection's ambient send context.

pub mod scoped;
pub mod traits;

pub use scoped::{ScopedEncryptionLevel, ScopedPacketFlusher};
pub use traits::SessionConnection;
