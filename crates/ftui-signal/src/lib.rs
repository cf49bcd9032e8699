#![forbid(unsafe_code)]

//! Typed signal/slot broadcasting for FrankenTUI.
//!
//! A [`Signal`] lets independent observers register callbacks that run, in
//! registration order, every time the owner emits. This crate is about the
//! connection lifetime protocol around that loop:
//!
//! - [`ConnectionView`]: handle returned by every `add*` call; disconnects
//!   on request, never on drop.
//! - [`ScopedConnection`]: RAII guard that disconnects on drop.
//! - [`AutoDisconnect`] + [`Observer`]: observers that embed a tracker have
//!   all their slots disconnected when they are dropped.
//! - [`ByValue`], [`ByRef`], [`ByMut`]: how the emitted argument reaches
//!   each slot.
//!
//! # Architecture
//!
//! Single-threaded, built on `Rc`/`Cell`/`RefCell`; none of the public types
//! are `Send`. A slot's connection token is shared between the signal and
//! every handle to it, and points back at the signal only through a `Weak`,
//! so signals, handles and observers may be dropped in any order.
//!
//! # Invariants
//!
//! 1. Slots are invoked in registration order.
//! 2. A slot disconnected during an emission is skipped for the rest of that
//!    emission; storage is compacted only after the pass completes.
//! 3. `count()` reports connected slots only.
//! 4. Disconnecting is idempotent and never faults, whichever side is gone.
//! 5. Dropping a signal never invokes a callback.
//!
//! # Feature flags
//!
//! - `tracing`: emit `tracing` events for compaction, teardown and slots
//!   whose target is gone without disconnecting.

pub mod auto_disconnect;
mod connection;
pub mod signal;
pub mod signature;
pub mod view;

pub use auto_disconnect::{AutoDisconnect, Observer};
pub use signal::Signal;
pub use signature::{ByMut, ByRef, ByValue, Signature};
pub use view::{ConnectionView, ScopedConnection};
