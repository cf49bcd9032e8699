#![forbid(unsafe_code)]

//! Lifetime-bound disconnection for observers.
//!
//! # Design
//!
//! An observer that embeds an [`AutoDisconnect`] and returns it from
//! [`Observer::auto_disconnect`] has every slot registered through
//! [`Signal::add_method`](crate::Signal::add_method) tracked automatically.
//! When the observer is dropped, the tracker disconnects all of them, so
//! `count()` on each signal drops immediately and no later emit reaches the
//! observer. The `ConnectionView` returned by `add_method` may simply be
//! discarded.
//!
//! # Copy/move policy
//!
//! A slot is bound to the observer's `Rc<RefCell<T>>` cell *and* to the
//! tracker that was inside it at registration. Moving the observer together
//! with its tracker out of the cell (for example with `mem::replace`)
//! invalidates the pairing: the tracker keeps the connections and retires
//! them when dropped, and until then the slot never calls whatever value now
//! sits in the cell; the next emit retires it instead. Cloning a tracker
//! yields an **empty** tracker: connections are never transferred to a
//! clone.
//!
//! # Registering while borrowed
//!
//! An observer may connect itself to another signal from inside one of its
//! own handlers, while its cell is mutably borrowed. The tracker of the
//! observer being dispatched is recorded for the duration of the call, so
//! such connections are tracked immediately. If the cell is borrowed
//! anywhere else, tracking is deferred to the slot's first invocation.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use ftui_signal::{AutoDisconnect, ByValue, Observer, Signal};
//!
//! #[derive(Default)]
//! struct Counter {
//!     hits: u32,
//!     tracker: AutoDisconnect,
//! }
//!
//! impl Counter {
//!     fn on_tick(&mut self, _: ()) {
//!         self.hits += 1;
//!     }
//! }
//!
//! impl Observer for Counter {
//!     fn auto_disconnect(&self) -> Option<&AutoDisconnect> {
//!         Some(&self.tracker)
//!     }
//! }
//!
//! let mut tick: Signal<ByValue<()>> = Signal::new();
//! let counter = Rc::new(RefCell::new(Counter::default()));
//! tick.add_method(&counter, Counter::on_tick);
//! tick.emit(());
//! assert_eq!(counter.borrow().hits, 1);
//!
//! drop(counter);
//! assert_eq!(tick.count(), 0);
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::connection::Connection;

/// A type whose methods can be connected with
/// [`Signal::add_method`](crate::Signal::add_method).
///
/// The default implementation opts out of automatic disconnection.
pub trait Observer {
    /// Tracker to register new connections with, if this type disconnects
    /// its slots when dropped.
    fn auto_disconnect(&self) -> Option<&AutoDisconnect> {
        None
    }
}

/// Connection list shared by a tracker and, weakly, by the slots bound to
/// it. Its allocation is the tracker's identity.
#[derive(Default)]
pub(crate) struct TrackerCore {
    connections: RefCell<Vec<Rc<Connection>>>,
}

impl TrackerCore {
    fn track(&self, connection: &Rc<Connection>) {
        let mut connections = self.connections.borrow_mut();
        connections.retain(|c| c.is_active());
        connections.push(Rc::clone(connection));
    }

    fn disconnect_all(&self) -> usize {
        let connections = self.connections.take();
        connections.iter().filter(|c| c.disconnect()).count()
    }
}

/// Collects connections and disconnects them all on drop.
#[derive(Default)]
pub struct AutoDisconnect {
    core: Rc<TrackerCore>,
}

impl AutoDisconnect {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a connection. Entries already retired are pruned first so a
    /// long-lived observer that reconnects repeatedly does not accumulate
    /// dead tokens.
    pub(crate) fn track(&self, connection: &Rc<Connection>) {
        self.core.track(connection);
    }

    fn identity(&self) -> Weak<TrackerCore> {
        Rc::downgrade(&self.core)
    }

    fn is(&self, identity: &Weak<TrackerCore>) -> bool {
        std::ptr::eq(identity.as_ptr(), Rc::as_ptr(&self.core))
    }

    /// Number of tracked connections that are still active.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core
            .connections
            .borrow()
            .iter()
            .filter(|c| c.is_active())
            .count()
    }

    /// Whether no tracked connection is still active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disconnect every tracked connection now.
    ///
    /// Returns how many slots this call retired.
    pub fn disconnect_all(&self) -> usize {
        self.core.disconnect_all()
    }
}

impl Clone for AutoDisconnect {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Drop for AutoDisconnect {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}

impl std::fmt::Debug for AutoDisconnect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoDisconnect")
            .field("active", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Slot/observer pairing
// ---------------------------------------------------------------------------

/// How a bound slot relates to its observer's tracker.
pub(crate) enum ObserverBinding {
    /// The observer exposes no tracker.
    Untracked,
    /// Registered with this tracker; any other tracker in the cell means the
    /// original observer was moved out.
    Tracked(Weak<TrackerCore>),
    /// The cell was borrowed at registration. Resolved on first call.
    Pending(Rc<Connection>),
}

impl ObserverBinding {
    /// Pair `connection` with the observer in `cell`.
    pub(crate) fn register<T: Observer>(
        cell: &Rc<RefCell<T>>,
        connection: &Rc<Connection>,
    ) -> Self {
        if let Ok(target) = cell.try_borrow() {
            return Self::bind(target.auto_disconnect(), connection);
        }
        match DispatchFrame::tracker_of(cell) {
            Some(None) => Self::Untracked,
            Some(Some(identity)) => match identity.upgrade() {
                Some(core) => {
                    core.track(connection);
                    Self::Tracked(identity)
                }
                None => Self::Pending(Rc::clone(connection)),
            },
            None => Self::Pending(Rc::clone(connection)),
        }
    }

    fn bind(tracker: Option<&AutoDisconnect>, connection: &Rc<Connection>) -> Self {
        match tracker {
            Some(tracker) => {
                tracker.track(connection);
                Self::Tracked(tracker.identity())
            }
            None => Self::Untracked,
        }
    }

    /// Check that `target`, borrowed from `cell`, is still the observer this
    /// slot was registered for, and open a dispatch frame for the call.
    ///
    /// Returns `None` when the pairing is broken; the slot must be retired.
    pub(crate) fn enter<T: Observer>(
        &mut self,
        cell: &Rc<RefCell<T>>,
        target: &T,
    ) -> Option<DispatchFrame> {
        let current = target.auto_disconnect();
        match self {
            Self::Untracked => {}
            Self::Tracked(identity) => {
                if !current.is_some_and(|tracker| tracker.is(identity)) {
                    return None;
                }
            }
            Self::Pending(connection) => {
                let connection = Rc::clone(connection);
                *self = Self::bind(current, &connection);
            }
        }
        Some(DispatchFrame::enter(cell, current))
    }
}

struct Frame {
    cell: *const (),
    tracker: Option<Weak<TrackerCore>>,
}

thread_local! {
    /// Observers currently being called, innermost last.
    static DISPATCHING: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard marking an observer as being called by a slot. Popped on drop.
#[must_use]
pub(crate) struct DispatchFrame {
    /// Thread-local data; keeps the guard `!Send`.
    _marker: std::marker::PhantomData<*const ()>,
}

impl DispatchFrame {
    fn enter<T>(cell: &Rc<RefCell<T>>, tracker: Option<&AutoDisconnect>) -> Self {
        let frame = Frame {
            cell: Rc::as_ptr(cell).cast(),
            tracker: tracker.map(AutoDisconnect::identity),
        };
        DISPATCHING.with(|frames| frames.borrow_mut().push(frame));
        Self {
            _marker: std::marker::PhantomData,
        }
    }

    /// Tracker of `cell` if it is currently being called: `Some(None)` when
    /// it has none, `None` when `cell` is not in dispatch.
    fn tracker_of<T>(cell: &Rc<RefCell<T>>) -> Option<Option<Weak<TrackerCore>>> {
        let cell: *const () = Rc::as_ptr(cell).cast();
        DISPATCHING.with(|frames| {
            frames
                .borrow()
                .iter()
                .rev()
                .find(|frame| std::ptr::eq(frame.cell, cell))
                .map(|frame| frame.tracker.clone())
        })
    }
}

impl Drop for DispatchFrame {
    fn drop(&mut self) {
        DISPATCHING.with(|frames| {
            frames.borrow_mut().pop();
        });
    }
}
