#![forbid(unsafe_code)]

//! Typed callback registry and dispatcher.
//!
//! # Design
//!
//! [`Signal<S>`] owns its slots directly. Each slot pairs a callable with an
//! `Rc` to its `Connection` token. Validity flags, the live count and the dirty
//! flag live in a small shared core (`Rc<SignalCore>`) that connections
//! reach through a `Weak`. Disconnecting therefore never touches the slot
//! storage: it only clears a flag, so it may be called from inside a
//! callback while `emit` is iterating.
//!
//! Retired slots stay in storage until the end of the next emission, when
//! compaction removes them, shifts the survivors down in order and updates
//! each surviving connection's index.
//!
//! # Performance
//!
//! | Operation          | Complexity                       |
//! |--------------------|----------------------------------|
//! | `add*()`           | O(1) amortized, one allocation   |
//! | `emit()`           | O(N) where N = stored slots      |
//! | `count()`          | O(1)                             |
//! | disconnect         | O(1)                             |
//!
//! # Failure Modes
//!
//! - **Re-entrant emit**: `emit` takes `&mut self`, so a callback cannot
//!   emit the same signal unless the signal sits behind a `RefCell`, in
//!   which case the `RefCell` panics. Re-entrant emission is unsupported.
//! - **Target borrowed during dispatch**: a bound method borrows its target
//!   mutably. If the target is already borrowed (for example, it emitted the
//!   signal from one of its own methods), the `RefCell` panics. Registering
//!   a borrowed target never panics; see
//!   [`auto_disconnect`](crate::auto_disconnect#registering-while-borrowed).
//! - **Storage growth without emits**: retired slots are reclaimed only by
//!   compaction at the end of `emit` or by `disconnect_all`.
//! - **Panicking callback**: the panic propagates. The dirty flag stays set
//!   and compaction happens on the next completed emission.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use ftui_signal::{ByValue, Signal};
//!
//! thread_local! { static LAST: Cell<i32> = const { Cell::new(0) }; }
//! fn record(v: i32) { LAST.with(|l| l.set(v)); }
//!
//! let mut changed: Signal<ByValue<i32>> = Signal::new();
//! let mut view = changed.add(record);
//! changed.emit(7);
//! assert_eq!(LAST.with(Cell::get), 7);
//!
//! view.disconnect();
//! changed.emit(8);
//! assert_eq!(LAST.with(Cell::get), 7);
//! assert_eq!(changed.count(), 0);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::auto_disconnect::{Observer, ObserverBinding};
use crate::connection::Connection;
use crate::signature::{ByMut, ByRef, ByValue, Callback, Signature};
use crate::view::ConnectionView;

// ---------------------------------------------------------------------------
// Shared core
// ---------------------------------------------------------------------------

/// Bookkeeping shared between a signal and its connections.
#[derive(Debug, Default)]
pub(crate) struct SignalCore {
    /// One flag per stored slot; `false` once retired.
    valid: RefCell<Vec<bool>>,
    /// Number of `true` entries in `valid`.
    live: Cell<usize>,
    /// At least one slot retired since the last compaction.
    dirty: Cell<bool>,
}

impl SignalCore {
    pub(crate) fn push_live(&self) {
        self.valid.borrow_mut().push(true);
        self.live.set(self.live.get() + 1);
    }

    /// Clear the validity flag at `index`. Returns `false` if it was already
    /// clear.
    pub(crate) fn retire(&self, index: usize) -> bool {
        let mut valid = self.valid.borrow_mut();
        match valid.get_mut(index) {
            Some(flag) if *flag => {
                *flag = false;
                self.live.set(self.live.get() - 1);
                self.dirty.set(true);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_valid(&self, index: usize) -> bool {
        self.valid.borrow().get(index).copied().unwrap_or(false)
    }

    pub(crate) fn live(&self) -> usize {
        self.live.get()
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Reset to `len` valid slots after compaction or teardown.
    fn reset(&self, len: usize) {
        let mut valid = self.valid.borrow_mut();
        valid.clear();
        valid.resize(len, true);
        self.live.set(len);
        self.dirty.set(false);
    }
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

struct Slot<S: Signature> {
    callback: Callback<S>,
    connection: Rc<Connection>,
}

/// A typed, multi-subscriber callback broadcaster.
///
/// `S` is a [`Signature`] marker: [`ByValue`], [`ByRef`] or [`ByMut`].
///
/// # Invariants
///
/// 1. Slots are invoked in registration order.
/// 2. A slot retired before or during an emission is not invoked for the
///    rest of that emission or ever again.
/// 3. [`count()`](Signal::count) equals the number of connected slots,
///    regardless of storage awaiting compaction.
/// 4. After compaction, every surviving connection's index addresses the
///    slot that holds it.
/// 5. Dropping the signal retires every connection without invoking any
///    callback.
pub struct Signal<S: Signature> {
    core: Rc<SignalCore>,
    slots: Vec<Slot<S>>,
}

impl<S: Signature> Default for Signal<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Signature> std::fmt::Debug for Signal<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&'static str> = self.slots.iter().map(|s| s.callback.kind()).collect();
        f.debug_struct("Signal")
            .field("count", &self.count())
            .field("storage_len", &self.storage_len())
            .field("dirty", &self.core.is_dirty())
            .field("slots", &kinds)
            .finish()
    }
}

impl<S: Signature> Signal<S> {
    /// Create an empty signal.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty signal with room for `capacity` slots before
    /// reallocating.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            core: Rc::new(SignalCore {
                valid: RefCell::new(Vec::with_capacity(capacity)),
                live: Cell::new(0),
                dirty: Cell::new(false),
            }),
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Connect a plain function.
    ///
    /// The function must match the signal's signature exactly:
    ///
    /// ```compile_fail
    /// use ftui_signal::{ByValue, Signal};
    ///
    /// fn narrow(_: u8) {}
    ///
    /// let mut sig: Signal<ByValue<i32>> = Signal::new();
    /// sig.add(narrow);
    /// ```
    ///
    /// ```compile_fail
    /// use ftui_signal::{ByRef, Signal};
    ///
    /// fn by_value(_: String) {}
    ///
    /// let mut sig: Signal<ByRef<String>> = Signal::new();
    /// sig.add(by_value);
    /// ```
    pub fn add(&mut self, callback: S::Free) -> ConnectionView {
        self.attach(|_| Callback::Free(callback))
    }

    /// Number of connected slots. Slots awaiting compaction are not counted.
    #[must_use]
    pub fn count(&self) -> usize {
        self.core.live()
    }

    /// Whether no slot is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Raw slot storage length, including retired slots not yet compacted.
    #[must_use]
    pub fn storage_len(&self) -> usize {
        self.slots.len()
    }

    /// Retire every connection without invoking any callback and release
    /// the slot storage. The signal stays usable.
    ///
    /// Returns how many connected slots were retired.
    pub fn disconnect_all(&mut self) -> usize {
        let retired = self.count();
        let slots = std::mem::take(&mut self.slots);
        for slot in &slots {
            slot.connection.detach();
        }
        self.core.reset(0);
        // Callables may own observers whose drop disconnects; every token is
        // already detached, so those calls are no-ops.
        drop(slots);
        retired
    }

    /// Open a slot and store the callable `make` builds for its connection.
    fn attach(&mut self, make: impl FnOnce(&Rc<Connection>) -> Callback<S>) -> ConnectionView {
        let connection = Connection::new(&self.core, self.slots.len());
        self.core.push_live();
        let callback = make(&connection);
        self.slots.push(Slot {
            callback,
            connection: Rc::clone(&connection),
        });
        ConnectionView::new(connection)
    }

    /// Invoke `invoke` on every valid slot, then compact if anything was
    /// retired. `invoke` returns `false` when a bound target is gone.
    fn dispatch(&mut self, mut invoke: impl FnMut(&mut Callback<S>) -> bool) {
        // `valid` may be cleared by any callback, so it is re-read per slot.
        for index in 0..self.slots.len() {
            if !self.core.is_valid(index) {
                continue;
            }
            let slot = &mut self.slots[index];
            if !invoke(&mut slot.callback) {
                #[cfg(feature = "tracing")]
                debug!(index, "signal slot target gone without disconnect");
                slot.connection.disconnect();
            }
        }
        if self.core.is_dirty() {
            self.compact();
        }
    }

    fn compact(&mut self) {
        let stored = std::mem::take(&mut self.slots);
        self.slots.reserve(self.core.live());
        #[cfg(feature = "tracing")]
        let before = stored.len();

        let mut retired = Vec::new();
        for (index, slot) in stored.into_iter().enumerate() {
            if self.core.is_valid(index) {
                slot.connection.relocate(self.slots.len());
                self.slots.push(slot);
            } else {
                retired.push(slot);
            }
        }
        debug_assert_eq!(self.slots.len(), self.core.live());
        self.core.reset(self.slots.len());

        #[cfg(feature = "tracing")]
        trace!(
            retired = before - self.slots.len(),
            live = self.slots.len(),
            "signal compacted"
        );

        // Dropped last: a callable's drop may disconnect a surviving slot,
        // which needs the indices above to be current.
        drop(retired);
    }

    #[cfg(test)]
    fn indices_consistent(&self) -> bool {
        self.slots
            .iter()
            .enumerate()
            .all(|(index, slot)| slot.connection.index().is_none_or(|i| i == index))
    }
}

impl<S: Signature> Drop for Signal<S> {
    fn drop(&mut self) {
        #[cfg(feature = "tracing")]
        if !self.slots.is_empty() {
            trace!(outstanding = self.count(), "signal dropped");
        }
        self.disconnect_all();
    }
}

// ---------------------------------------------------------------------------
// Calling conventions
// ---------------------------------------------------------------------------

impl<A: 'static, R: 'static> Signal<ByValue<A, R>> {
    /// Connect `method` on a shared observer. The signal holds the target
    /// weakly; if `T` exposes an [`AutoDisconnect`](crate::AutoDisconnect)
    /// the connection is also registered with it.
    ///
    /// `target` may be mutably borrowed, for example when an observer
    /// connects itself from inside one of its own handlers.
    pub fn add_method<T: Observer + 'static>(
        &mut self,
        target: &Rc<RefCell<T>>,
        method: fn(&mut T, A) -> R,
    ) -> ConnectionView {
        let weak = Rc::downgrade(target);
        self.attach(|connection| {
            let mut binding = ObserverBinding::register(target, connection);
            let bound: Box<dyn FnMut(A) -> Option<R>> = Box::new(move |args: A| {
                let strong = weak.upgrade()?;
                let mut target = strong.borrow_mut();
                let _frame = binding.enter(&strong, &target)?;
                Some(method(&mut target, args))
            });
            Callback::Bound(bound)
        })
    }

    /// Connect an arbitrary closure.
    pub fn add_fn(&mut self, mut callback: impl FnMut(A) -> R + 'static) -> ConnectionView {
        let bound: Box<dyn FnMut(A) -> Option<R>> = Box::new(move |args: A| Some(callback(args)));
        self.attach(|_| Callback::Bound(bound))
    }
}

impl<A: Clone + 'static, R: 'static> Signal<ByValue<A, R>> {
    /// Invoke every connected slot in order with a clone of `args`.
    pub fn emit(&mut self, args: A) {
        self.dispatch(|callback| match callback {
            Callback::Free(f) => {
                f(args.clone());
                true
            }
            Callback::Bound(bound) => bound(args.clone()).is_some(),
        });
    }
}

impl<A: ?Sized + 'static, R: 'static> Signal<ByRef<A, R>> {
    /// Connect `method` on a shared observer. The signal holds the target
    /// weakly and registers with its
    /// [`AutoDisconnect`](crate::AutoDisconnect), if any.
    pub fn add_method<T: Observer + 'static>(
        &mut self,
        target: &Rc<RefCell<T>>,
        method: fn(&mut T, &A) -> R,
    ) -> ConnectionView {
        let weak = Rc::downgrade(target);
        self.attach(|connection| {
            let mut binding = ObserverBinding::register(target, connection);
            let bound: Box<dyn FnMut(&A) -> Option<R>> = Box::new(move |args: &A| {
                let strong = weak.upgrade()?;
                let mut target = strong.borrow_mut();
                let _frame = binding.enter(&strong, &target)?;
                Some(method(&mut target, args))
            });
            Callback::Bound(bound)
        })
    }

    /// Connect an arbitrary closure.
    pub fn add_fn(&mut self, mut callback: impl FnMut(&A) -> R + 'static) -> ConnectionView {
        let bound: Box<dyn FnMut(&A) -> Option<R>> =
            Box::new(move |args: &A| Some(callback(args)));
        self.attach(|_| Callback::Bound(bound))
    }

    /// Invoke every connected slot in order with a shared reference to
    /// `args`.
    pub fn emit(&mut self, args: &A) {
        self.dispatch(|callback| match callback {
            Callback::Free(f) => {
                f(args);
                true
            }
            Callback::Bound(bound) => bound(args).is_some(),
        });
    }
}

impl<A: ?Sized + 'static, R: 'static> Signal<ByMut<A, R>> {
    /// Connect `method` on a shared observer.
    pub fn add_method<T: Observer + 'static>(
        &mut self,
        target: &Rc<RefCell<T>>,
        method: fn(&mut T, &mut A) -> R,
    ) -> ConnectionView {
        let weak = Rc::downgrade(target);
        self.attach(|connection| {
            let mut binding = ObserverBinding::register(target, connection);
            let bound: Box<dyn FnMut(&mut A) -> Option<R>> = Box::new(move |args: &mut A| {
                let strong = weak.upgrade()?;
                let mut target = strong.borrow_mut();
                let _frame = binding.enter(&strong, &target)?;
                Some(method(&mut target, args))
            });
            Callback::Bound(bound)
        })
    }

    /// Connect an arbitrary closure.
    pub fn add_fn(&mut self, mut callback: impl FnMut(&mut A) -> R + 'static) -> ConnectionView {
        let bound: Box<dyn FnMut(&mut A) -> Option<R>> =
            Box::new(move |args: &mut A| Some(callback(args)));
        self.attach(|_| Callback::Bound(bound))
    }

    /// Invoke every connected slot in order, lending each a mutable
    /// reference to `args`.
    pub fn emit(&mut self, args: &mut A) {
        self.dispatch(|callback| match callback {
            Callback::Free(f) => {
                f(&mut *args);
                true
            }
            Callback::Bound(bound) => bound(&mut *args).is_some(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
