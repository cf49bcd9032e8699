#![forbid(unsafe_code)]

//! Caller-held handles for manual disconnection.
//!
//! [`ConnectionView`] is returned by every `add*` call on a
//! [`Signal`](crate::Signal). Dropping it does **not** disconnect the slot;
//! only [`ConnectionView::disconnect`] does. Wrap it in a
//! [`ScopedConnection`] to tie the slot to a scope instead.
//!
//! Views are cloneable. All clones share one token, so any of them may
//! disconnect and the others observe the result through
//! [`ConnectionView::is_connected`].

use std::rc::Rc;

use crate::connection::Connection;

/// Handle to one registered slot.
///
/// A default-constructed view refers to nothing; every operation on it is a
/// no-op.
#[derive(Clone, Default)]
pub struct ConnectionView {
    connection: Option<Rc<Connection>>,
}

impl ConnectionView {
    pub(crate) fn new(connection: Rc<Connection>) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    /// Disconnect the slot and release this handle's share of the token.
    ///
    /// Returns `true` if this call retired the slot. Calling it again, on a
    /// clone whose sibling already disconnected, or after the signal was
    /// dropped returns `false` and does nothing else.
    pub fn disconnect(&mut self) -> bool {
        self.connection
            .take()
            .is_some_and(|connection| connection.disconnect())
    }

    /// Whether the slot is still registered with a live signal.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| connection.is_active())
    }

    /// Convert into a guard that disconnects when dropped.
    #[must_use]
    pub fn scoped(self) -> ScopedConnection {
        ScopedConnection { view: self }
    }

    #[cfg(test)]
    pub(crate) fn holders(&self) -> usize {
        self.connection.as_ref().map_or(0, Rc::strong_count)
    }
}

impl std::fmt::Debug for ConnectionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionView")
            .field("connection", &self.connection)
            .finish()
    }
}

/// RAII guard that disconnects its slot on drop.
///
/// Holding a `ScopedConnection` in a struct field ties the slot's lifetime
/// to the struct, which is the manual counterpart to
/// [`AutoDisconnect`](crate::AutoDisconnect).
#[derive(Debug, Default)]
pub struct ScopedConnection {
    view: ConnectionView,
}

impl ScopedConnection {
    /// Whether the slot is still registered with a live signal.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.view.is_connected()
    }

    /// Disconnect now. Returns `true` if this call retired the slot.
    pub fn disconnect(&mut self) -> bool {
        self.view.disconnect()
    }

    /// Give up the guard without disconnecting.
    #[must_use]
    pub fn release(mut self) -> ConnectionView {
        std::mem::take(&mut self.view)
    }
}

impl From<ConnectionView> for ScopedConnection {
    fn from(view: ConnectionView) -> Self {
        view.scoped()
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        self.view.disconnect();
    }
}
