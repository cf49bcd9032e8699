#![forbid(unsafe_code)]

//! Shared cancellation token for one slot.
//!
//! # Design
//!
//! A [`Connection`] is shared (`Rc`) between the signal's slot, every
//! [`ConnectionView`](crate::ConnectionView) clone and, optionally, one
//! [`AutoDisconnect`](crate::AutoDisconnect) tracker. It points back at the
//! signal only through a `Weak`, so the signal may be dropped first without
//! leaving a dangling reference behind.
//!
//! # State machine
//!
//! ```text
//! Active { signal, index } ──disconnect / detach──▶ Retired
//! ```
//!
//! `Retired` is terminal. Retiring twice is a no-op. The token itself is
//! freed when the last holder drops its `Rc`, independently of its state.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::signal::SignalCore;

/// Shared token identifying one slot inside one signal.
pub(crate) struct Connection {
    /// Back-reference to the owning signal. Empty once retired.
    signal: RefCell<Weak<SignalCore>>,
    /// Slot position inside the signal. `None` once retired.
    index: Cell<Option<usize>>,
}

impl Connection {
    pub(crate) fn new(signal: &Rc<SignalCore>, index: usize) -> Rc<Self> {
        Rc::new(Self {
            signal: RefCell::new(Rc::downgrade(signal)),
            index: Cell::new(Some(index)),
        })
    }

    /// Retire the connection through its signal.
    ///
    /// Clears the addressed slot's validity flag so the next (or current)
    /// emission skips it. Returns `true` if this call performed the
    /// retirement, `false` if the connection was already retired or the
    /// signal is gone.
    pub(crate) fn disconnect(&self) -> bool {
        let signal = self.signal.replace(Weak::new());
        let index = self.index.take();
        match (signal.upgrade(), index) {
            (Some(core), Some(index)) => core.retire(index),
            _ => false,
        }
    }

    /// Retire without touching the signal. Used when the signal itself is
    /// tearing down its slot storage.
    pub(crate) fn detach(&self) {
        *self.signal.borrow_mut() = Weak::new();
        self.index.set(None);
    }

    /// Point the connection at a new slot position after compaction.
    pub(crate) fn relocate(&self, index: usize) {
        debug_assert!(self.index.get().is_some(), "relocating a retired connection");
        self.index.set(Some(index));
    }

    #[must_use]
    pub(crate) fn index(&self) -> Option<usize> {
        self.index.get()
    }

    #[must_use]
    pub(crate) fn is_active(&self) -> bool {
        self.index.get().is_some() && self.signal.borrow().strong_count() > 0
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("index", &self.index())
            .field("active", &self.is_active())
            .finish()
    }
}
