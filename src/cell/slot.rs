//! Unsafe, centralized operations on the cell's `MaybeUninit<T>` slot.
//!
//! [`GuardedCell`](super::GuardedCell) keeps its value in one `MaybeUninit<T>`
//! that is reused for every construction era. These helpers are the only
//! places that write, read or drop through it, so they can be audited together.
//!
//! ## Core invariant
//! The slot is initialized *exactly when* the owning cell's state byte is
//! `PRESENT`. Writes happen only while the state is `EMPTY`; drops happen only
//! after the state has been switched back to `EMPTY`. Both run under the
//! cell's lock.

use core::{cell::UnsafeCell, mem::MaybeUninit, ptr};

/// Interprets an initialized slot as `&T`.
///
/// # Safety
/// - `slot` must be initialized.
/// - No `drop_in_place` or `write` on the same slot may run while the returned
///   reference is in use.
#[inline(always)]
pub(crate) unsafe fn assume_init_ref<T>(slot: &UnsafeCell<MaybeUninit<T>>) -> &T {
    // SAFETY: caller asserts initialization and the absence of writers.
    unsafe { (*slot.get()).assume_init_ref() }
}

/// Moves `value` into an empty slot.
///
/// # Safety
/// - `slot` must not hold a live value (it would be leaked).
/// - The caller must have exclusive access to the slot.
#[inline(always)]
pub(crate) unsafe fn write<T>(slot: &UnsafeCell<MaybeUninit<T>>, value: T) {
    // SAFETY: caller upholds emptiness + exclusivity.
    unsafe { ptr::write(slot.get().cast::<T>(), value) }
}

/// Drops the value in place, leaving the slot logically empty.
///
/// # Safety
/// - `slot` must be initialized.
/// - The caller must have exclusive access; no reference obtained through
///   [`assume_init_ref`] may be used afterwards.
/// - Must not be called more than once for the same value.
#[inline(always)]
pub(crate) unsafe fn drop_in_place<T>(slot: &UnsafeCell<MaybeUninit<T>>) {
    // SAFETY: caller asserts initialization and drop uniqueness.
    unsafe { ptr::drop_in_place(slot.get().cast::<T>()) }
}
