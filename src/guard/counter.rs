//! `ReferenceCounter` - the per-type count of outstanding keep-alive tokens.

use core::sync::atomic::{AtomicU64, Ordering};
use crossbeam_utils::CachePadded;

use crate::error::{fatal, LifetimeViolation};

/// An atomic, never-negative reference count.
///
/// Padded to its own cache line: every token of a type hammers this word,
/// while the neighbouring cell state is read-mostly.
pub struct ReferenceCounter {
    count: CachePadded<AtomicU64>,
    type_name: &'static str,
}

impl ReferenceCounter {
    /// Creates a zero count for the resource named `type_name`.
    pub const fn new(type_name: &'static str) -> Self {
        Self {
            count: CachePadded::new(AtomicU64::new(0)),
            type_name,
        }
    }

    /// Adds one unit and returns the previous count.
    #[inline]
    pub fn increment(&self) -> u64 {
        // SeqCst: a new token's increment and its later read of the cell state
        // must order against a release's RETIRING store and count read.
        self.count.fetch_add(1, Ordering::SeqCst)
    }

    /// Removes one unit and returns the previous count.
    ///
    /// A return value of `1` means this call observed the 1→0 transition.
    ///
    /// # Panics
    /// Decrementing a zero count is a fatal invariant violation; the count is
    /// left at zero.
    #[inline]
    #[track_caller]
    pub fn decrement(&self) -> u64 {
        match self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            }) {
            Ok(previous) => previous,
            Err(_) => fatal(LifetimeViolation::CountUnderflow {
                type_name: self.type_name,
            }),
        }
    }

    /// Returns the current count.
    #[inline]
    pub fn read(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Overwrites the count and returns the previous value.
    ///
    /// # Safety
    /// Breaks the link between the count and the number of live tokens. The
    /// caller must restore it (typically by letting existing tokens drop) and
    /// must not use resource references past a destruction this causes.
    #[inline]
    pub(crate) unsafe fn force_set(&self, count: u64) -> u64 {
        self.count.swap(count, Ordering::SeqCst)
    }

    /// Returns the resource type name this counter belongs to.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl core::fmt::Debug for ReferenceCounter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReferenceCounter")
            .field("type_name", &self.type_name)
            .field("count", &self.read())
            .finish()
    }
}
