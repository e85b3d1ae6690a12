//! # `lifetime-guard` - Reconstructible Process-Wide Singletons
//!
//! Reference-counted lifetime guards for shared resources (allocators,
//! registries, error sinks) that independently compiled components depend on.
//! A resource is constructed lazily on first use, stays alive while any
//! component holds a guard for it, is destroyed when the last guard goes away,
//! and can be constructed again afterwards.
//!
//! ## Why not `OnceLock`?
//!
//! A `static` initialized through `OnceLock` or `LazyLock` is constructed at
//! most once and never destroyed. That gives no control over teardown order
//! between resources and rules out rebuilding a resource that was torn down.
//! Here the storage is a reusable cell with an explicit EMPTY/PRESENT state
//! machine, and the reference count decides when it transitions.
//!
//! ## Architecture
//!
//! 1. **Reference counter** (`ReferenceCounter`):
//!    - Cache-padded atomic count of keep-alive tokens
//!    - Refuses to go below zero (fatal violation)
//!
//! 2. **Guarded cell** (`GuardedCell<T>`):
//!    - One `MaybeUninit<T>` slot reused across construction eras
//!    - Construction and destruction serialized by a futex-backed `RawLock`
//!    - Lock-free reads once the value is published
//!
//! 3. **Guard token** (`StaticLifetimeGuard<T>`):
//!    - RAII handle owning one unit of `T`'s count
//!    - Copy and move-out both add a unit; assignment never changes the count
//!
//! 4. **Accessor** (`StaticLifetimeGuard::<T>::instance()`):
//!    - Double-checked construction on top of the cell
//!    - Stores one anchor token per construction era
//!
//! ## Example
//!
//! ```rust
//! use lifetime_guard::StaticLifetimeGuard;
//!
//! #[derive(Default)]
//! struct ErrorSink {
//!     reported: std::sync::atomic::AtomicUsize,
//! }
//!
//! let sink = StaticLifetimeGuard::<ErrorSink>::instance();
//! sink.reported.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!
//! // The same instance for every caller, alive through its anchor.
//! let again = StaticLifetimeGuard::<ErrorSink>::instance();
//! assert!(std::ptr::eq(sink, again));
//! assert_eq!(StaticLifetimeGuard::<ErrorSink>::count(), 1);
//! assert_eq!(StaticLifetimeGuard::<ErrorSink>::generation(), 1);
//! ```
//!
//! ## Features
//!
//! - `tracing`: emit construction, destruction and violation events.
//! - `testing`: expose [`testing`] for downstream test suites.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod diagnostics;

pub mod cell;
pub mod concurrency;
pub mod error;
pub mod guard;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cell::GuardedCell;
pub use diagnostics::GuardSnapshot;
pub use error::LifetimeViolation;
pub use guard::{ReferenceCounter, StaticLifetimeGuard};

// Compile-time layout checks.
const _: () = {
    use core::mem;

    struct Probe;

    // A token is exactly one pointer to its type's shared state.
    assert!(mem::size_of::<StaticLifetimeGuard<Probe>>() == mem::size_of::<usize>());
    assert!(
        mem::size_of::<Option<StaticLifetimeGuard<Probe>>>() == mem::size_of::<usize>()
    );
};
