//! `StaticLifetimeGuard` - reference-counted lifetime control for a
//! process-wide, lazily constructed resource.
//!
//! Every distinct type `T` gets exactly one shared facility: a reference count
//! and a [`GuardedCell`](crate::cell::GuardedCell) holding at most one `T`.
//! Tokens of type `StaticLifetimeGuard<T>` drive the count; the resource is
//! destroyed when the count drops to zero and can be constructed again later
//! (a fresh instance, with a new [`generation`](StaticLifetimeGuard::generation)).
//!
//! ## Core invariant
//! Between operations, `count() == 0` exactly when no `T` is alive.
//!
//! ## Tokens versus the resource
//! Creating a token never constructs `T`; it only promises that a `T`, once
//! constructed, outlives the token. Construction is the job of
//! [`instance`](StaticLifetimeGuard::instance), which additionally stores one
//! *anchor* token per construction era. The anchor keeps the resource alive
//! even when no user token exists.
//!
//! ## Copy and move semantics
//! | operation                                   | effect on `count()` |
//! |---------------------------------------------|---------------------|
//! | `StaticLifetimeGuard::new()` / `default()`  | +1                  |
//! | `guard.clone()`                             | +1                  |
//! | `std::mem::take(&mut guard)` / [`take_from`](StaticLifetimeGuard::take_from) | +1 |
//! | `a.clone_from(&b)`                          | unchanged           |
//! | `std::mem::swap(&mut a, &mut b)` / [`assign_from`](StaticLifetimeGuard::assign_from) | unchanged |
//! | drop                                        | −1                  |
//!
//! **Moving out of a place is not a transfer.** Taking a token out of a place
//! that must stay valid (`mem::take`) leaves a *new* token behind, so the count
//! goes up by one and both tokens are released independently. A plain Rust
//! move (`let b = a;`) just relocates the token and leaves the count alone.
//! Plain reassignment `a = b;` drops the old value of `a`, which releases one
//! unit like any other drop.
//!
//! ## Example
//!
//! ```rust
//! use lifetime_guard::StaticLifetimeGuard;
//!
//! #[derive(Default)]
//! struct Registry {
//!     name: &'static str,
//! }
//!
//! // Keep the registry alive for as long as this component exists.
//! let guard = StaticLifetimeGuard::<Registry>::new();
//! assert!(!StaticLifetimeGuard::<Registry>::is_constructed());
//!
//! let registry = StaticLifetimeGuard::<Registry>::instance();
//! assert_eq!(registry.name, "");
//! assert_eq!(StaticLifetimeGuard::<Registry>::count(), 2); // guard + anchor
//!
//! drop(guard);
//! assert_eq!(StaticLifetimeGuard::<Registry>::count(), 1);
//! ```
//!
//! ## Reentrancy
//! `T`'s constructor must not call `instance()` for the same `T`, and `T`'s
//! destructor must not release the last token of its own type; both would
//! wait on the cell lock they are running under.

pub mod counter;
pub(crate) mod registry;
pub(crate) mod state;


pub use counter::ReferenceCounter;

use core::fmt;

use crate::diagnostics::GuardSnapshot;
use state::LifetimeState;

/// A keep-alive token for the process-wide instance of `T`.
///
/// Pointer-sized and payload-free: it refers to the shared state of `T` and
/// owns one unit of its reference count. See the [module docs](crate::guard) for the
/// exact counting rules.
///
/// # Rebuilt instances are anchored too
/// Every construction era gets its own anchor, not only the first. After a
/// destruction, a `T` rebuilt by [`instance`](Self::instance) outlives the
/// user tokens that were alive when it was built: dropping them leaves the
/// count at one and the instance alive. It dies only once its anchor goes as
/// well, through [`release_anchor`](Self::release_anchor).
///
/// ```rust
/// use lifetime_guard::StaticLifetimeGuard;
///
/// #[derive(Default)]
/// struct Cache;
///
/// StaticLifetimeGuard::<Cache>::instance();
/// assert!(unsafe { StaticLifetimeGuard::<Cache>::release_anchor() });
/// assert!(!StaticLifetimeGuard::<Cache>::is_constructed());
///
/// // Second era: the user token is not the only unit.
/// let guard = StaticLifetimeGuard::<Cache>::new();
/// StaticLifetimeGuard::<Cache>::instance();
/// drop(guard);
/// assert!(StaticLifetimeGuard::<Cache>::is_constructed());
/// assert_eq!(StaticLifetimeGuard::<Cache>::count(), 1);
/// ```
pub struct StaticLifetimeGuard<T: Send + Sync + 'static> {
    state: &'static LifetimeState<T>,
}

impl<T: Send + Sync + 'static> StaticLifetimeGuard<T> {
    /// Creates a token, incrementing the count of `T` by one.
    ///
    /// Does not construct `T`.
    #[inline]
    pub fn new() -> Self {
        Self::attach(registry::state_of::<T>())
    }

    #[inline]
    pub(crate) fn attach(state: &'static LifetimeState<T>) -> Self {
        state.counter.increment();
        Self { state }
    }

    /// Returns the process-wide `T`, constructing it with `T::default()` if
    /// it does not exist.
    ///
    /// See [`instance_with`](Self::instance_with).
    #[inline]
    pub fn instance() -> &'static T
    where
        T: Default,
    {
        Self::instance_with(T::default)
    }

    /// Returns the process-wide `T`, constructing it with `init` if it does
    /// not exist.
    ///
    /// `init` runs at most once per construction era, even when many threads
    /// call this concurrently; all of them receive the same reference. The
    /// construction that starts an era also stores an anchor token, so the
    /// count rises by one exactly then. Calls that find `T` alive change
    /// nothing.
    ///
    /// The reference stays valid while the count is positive, which the
    /// anchor guarantees unless one of the `unsafe` overrides
    /// ([`release_anchor`](Self::release_anchor) or the `testing` module)
    /// drives it to zero.
    #[inline]
    pub fn instance_with<F>(init: F) -> &'static T
    where
        F: FnOnce() -> T,
    {
        registry::state_of::<T>().instance_with(init)
    }

    /// Returns the number of outstanding tokens of `T`, the anchor included.
    #[inline]
    pub fn count() -> u64 {
        registry::state_of::<T>().counter.read()
    }

    /// Returns `true` if an instance of `T` is currently alive.
    #[inline]
    pub fn is_constructed() -> bool {
        registry::state_of::<T>().is_constructed()
    }

    /// Returns how many times `T` has been constructed.
    ///
    /// Every reconstruction after a destruction yields a distinct instance with
    /// a higher generation.
    #[inline]
    pub fn generation() -> u64 {
        registry::state_of::<T>().generation()
    }

    /// Captures the count, construction state, generation and anchor of `T`.
    pub fn snapshot() -> GuardSnapshot {
        registry::state_of::<T>().snapshot()
    }

    /// Releases the anchor token of the current construction era.
    ///
    /// Rust never runs destructors of statics, so this is the explicit
    /// stand-in for process teardown. If the anchor was the last token, `T`
    /// is destroyed before this returns. Returns `false` if there was no
    /// anchor to release.
    ///
    /// # Safety
    /// Once the anchor is gone, a reference obtained from
    /// [`instance`](Self::instance) or [`instance_with`](Self::instance_with)
    /// is only valid while its user holds a token of its own. The caller must
    /// ensure no code keeps using such a reference without one.
    pub unsafe fn release_anchor() -> bool {
        // SAFETY: forwarded to the caller.
        unsafe { registry::state_of::<T>().release_anchor() }
    }

    /// "Move-constructs" a token out of `source`, which stays valid.
    ///
    /// Equivalent to `std::mem::take(source)`: the count goes up by one and
    /// both tokens are released independently.
    #[inline]
    pub fn take_from(source: &mut Self) -> Self {
        core::mem::take(source)
    }

    /// "Move-assigns" `source` into `self` without touching the count.
    ///
    /// Both tokens keep the unit they already own.
    #[inline]
    pub fn assign_from(&mut self, source: &mut Self) {
        core::mem::swap(self, source);
    }
}

impl<T: Send + Sync + 'static> Default for StaticLifetimeGuard<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Clone for StaticLifetimeGuard<T> {
    /// Creates an additional token; the count goes up by one.
    #[inline]
    fn clone(&self) -> Self {
        Self::attach(self.state)
    }

    /// Copy assignment: a no-op for the count.
    #[inline]
    fn clone_from(&mut self, _source: &Self) {}
}

impl<T: Send + Sync + 'static> Drop for StaticLifetimeGuard<T> {
    #[inline]
    fn drop(&mut self) {
        if self.state.counter.decrement() == 1 {
            self.state.release_if_unreferenced();
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for StaticLifetimeGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticLifetimeGuard")
            .field("type_name", &self.state.counter.type_name())
            .field("count", &self.state.counter.read())
            .finish()
    }
}
