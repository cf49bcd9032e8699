#![forbid(unsafe_code)]

//! Call signatures and the type-erased callback union.
//!
//! A [`Signal`](crate::Signal) is parameterized by a marker type that fixes
//! both the argument type and how it is handed to each slot:
//!
//! | Marker          | `emit` takes | Free function      | Method                    |
//! |-----------------|--------------|--------------------|---------------------------|
//! | [`ByValue<A, R>`] | `A`        | `fn(A) -> R`       | `fn(&mut T, A) -> R`      |
//! | [`ByRef<A, R>`]   | `&A`       | `fn(&A) -> R`      | `fn(&mut T, &A) -> R`     |
//! | [`ByMut<A, R>`]   | `&mut A`   | `fn(&mut A) -> R`  | `fn(&mut T, &mut A) -> R` |
//!
//! Several arguments are passed as a tuple. A callback whose argument or
//! return type differs from the marker's is rejected at compile time because
//! the function item does not coerce to the expected pointer type.

use std::marker::PhantomData;

mod sealed {
    pub trait Sealed {}

    impl<A, R> Sealed for super::ByValue<A, R> {}
    impl<A: ?Sized, R> Sealed for super::ByRef<A, R> {}
    impl<A: ?Sized, R> Sealed for super::ByMut<A, R> {}
}

/// Compile-time description of a signal's call signature.
///
/// Sealed: implemented only by the [`ByValue`], [`ByRef`] and [`ByMut`]
/// markers.
///
/// ```compile_fail
/// use ftui_signal::Signature;
///
/// struct Custom;
///
/// impl Signature for Custom {
///     type Free = fn();
///     type Bound = dyn FnMut();
/// }
/// ```
pub trait Signature: sealed::Sealed + 'static {
    /// Plain function pointer accepted by [`Signal::add`](crate::Signal::add).
    type Free: 'static;
    /// Boxed trampoline for bound methods and closures. Returns `None` when
    /// the bound target no longer exists.
    type Bound: ?Sized + 'static;
}

/// Each slot receives its own clone of the emitted value.
pub struct ByValue<A, R = ()>(PhantomData<fn(A) -> R>);

/// Each slot receives a shared reference to the emitted value.
pub struct ByRef<A: ?Sized, R = ()>(PhantomData<fn(&A) -> R>);

/// Each slot receives, in turn, a mutable reference to the emitted value.
/// Later slots observe mutations made by earlier ones.
pub struct ByMut<A: ?Sized, R = ()>(PhantomData<fn(&mut A) -> R>);

impl<A: 'static, R: 'static> Signature for ByValue<A, R> {
    type Free = fn(A) -> R;
    type Bound = dyn FnMut(A) -> Option<R>;
}

impl<A: ?Sized + 'static, R: 'static> Signature for ByRef<A, R> {
    type Free = fn(&A) -> R;
    type Bound = dyn FnMut(&A) -> Option<R>;
}

impl<A: ?Sized + 'static, R: 'static> Signature for ByMut<A, R> {
    type Free = fn(&mut A) -> R;
    type Bound = dyn FnMut(&mut A) -> Option<R>;
}

/// The callable stored in one slot, selected at registration time.
pub(crate) enum Callback<S: Signature> {
    /// Context-free function pointer.
    Free(S::Free),
    /// Method trampoline over a weakly held target, or an owned closure.
    Bound(Box<S::Bound>),
}

impl<S: Signature> Callback<S> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Free(_) => "free",
            Self::Bound(_) => "bound",
        }
    }
}
