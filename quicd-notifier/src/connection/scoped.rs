//! Scoped guards over the connection's ambient send context.
//!
//! Both guards dereference to the wrapped connection, so sends issued through
//! the guard observe the temporary context. Restoration happens in `Drop`,
//! which covers early returns on write-blocked paths.

#![forbid(unsafe_code)]

use super::SessionConnection;
use crate::types::EncryptionLevel;
use core::ops::{Deref, DerefMut};

/// Switches the connection's encryption level for the guard's lifetime.
pub struct ScopedEncryptionLevel<'a, C: SessionConnection + ?Sized> {
    connection: &'a mut C,
    /// Level to restore; `None` when the level was left untouched
    saved: Option<EncryptionLevel>,
}

impl<'a, C: SessionConnection + ?Sized> ScopedEncryptionLevel<'a, C> {
    /// Switch to `level` until the guard is dropped
    pub fn new(connection: &'a mut C, level: EncryptionLevel) -> Self {
        Self::switch_to(connection, Some(level))
    }

    /// Switch to `level` if one is given; otherwise leave the level as is
    pub fn switch_to(connection: &'a mut C, level: Option<EncryptionLevel>) -> Self {
        let saved = level.map(|level| {
            let current = connection.encryption_level();
            connection.set_default_encryption_level(level);
            current
        });
        Self { connection, saved }
    }
}

impl<C: SessionConnection + ?Sized> Deref for ScopedEncryptionLevel<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &*self.connection
    }
}

impl<C: SessionConnection + ?Sized> DerefMut for ScopedEncryptionLevel<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut *self.connection
    }
}

impl<C: SessionConnection + ?Sized> Drop for ScopedEncryptionLevel<'_, C> {
    fn drop(&mut self) {
        if let Some(level) = self.saved {
            self.connection.set_default_encryption_level(level);
        }
    }
}

/// Bundles a batch of sends and flushes the connection when dropped.
pub struct ScopedPacketFlusher<'a, C: SessionConnection + ?Sized> {
    connection: &'a mut C,
}

impl<'a, C: SessionConnection + ?Sized> ScopedPacketFlusher<'a, C> {
    pub fn new(connection: &'a mut C) -> Self {
        Self { connection }
    }
}

impl<C: SessionConnection + ?Sized> Deref for ScopedPacketFlusher<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &*self.connection
    }
}

impl<C: SessionConnection + ?Sized> DerefMut for ScopedPacketFlusher<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut *self.connection
    }
}

impl<C: SessionConnection + ?Sized> Drop for ScopedPacketFlusher<'_, C> {
    fn drop(&mut self) {
        self.connection.flush_packets();
    }
}
