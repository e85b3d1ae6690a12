//! Test-only escape hatches.
//!
//! Compiled for this crate's own tests and, for downstream test suites, with
//! the `testing` feature. Nothing here belongs in production code: it exists
//! so tests can stage edge conditions ("only one token left") without building
//! the exact set of tokens that would produce them.

use crate::guard::registry;

/// Overwrites the reference count of `T` and returns the previous value.
///
/// # Safety
/// This breaks `count() == 0 ⇔ no instance`. Typical use is lowering the count
/// so that dropping the remaining tokens destroys the instance; dropping more
/// tokens than the forced count then panics with a count underflow. The caller
/// must not use references from `instance()` after a destruction this causes.
pub unsafe fn set_count<T: Send + Sync + 'static>(count: u64) -> u64 {
    // SAFETY: forwarded to the caller.
    unsafe { registry::state_of::<T>().counter.force_set(count) }
}
