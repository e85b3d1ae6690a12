//! `GuardedCell` - a reusable slot for at most one lazily constructed value.
//!
//! Unlike `std::sync::OnceLock`, the value can be destroyed in place and a fresh
//! one constructed later in the very same storage. Construction and
//! destruction are serialized by a [`RawLock`]; readers observe the value only
//! while the state byte says `PRESENT`.
//!
//! ## Retirement
//! Destruction is decided by [`CellSection::destroy_if`]. It first publishes
//! `RETIRING`, then evaluates the caller's predicate, and only then drops the
//! value or restores `PRESENT`. All three steps and the lock-free readers use
//! sequentially consistent ordering, so a reader that changed the predicate's
//! inputs before looking at the state either sees the value withdrawn (and
//! falls back to the lock) or is seen by the predicate.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

use super::slot;
use crate::concurrency::{RawLock, RawLockGuard};
use crate::error::{fatal, LifetimeViolation};

const EMPTY: u8 = 0;
const PRESENT: u8 = 1;
const RETIRING: u8 = 2;

/// Storage for at most one live `T`, constructible and destructible any number
/// of times.
pub struct GuardedCell<T> {
    lock: RawLock,
    state: AtomicU8,
    slot: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the value may be dropped on whichever thread destroys it, and shared
// references to it are handed to every thread.
unsafe impl<T: Send> Send for GuardedCell<T> {}
unsafe impl<T: Send + Sync> Sync for GuardedCell<T> {}

impl<T> GuardedCell<T> {
    /// Creates an empty cell.
    pub const fn new() -> Self {
        Self {
            lock: RawLock::new(),
            state: AtomicU8::new(EMPTY),
            slot: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Returns `true` if the cell currently holds a value.
    ///
    /// While a retirement check is in flight this reports `false`.
    #[inline]
    pub fn is_present(&self) -> bool {
        self.state.load(Ordering::SeqCst) == PRESENT
    }

    /// Returns the value if present, without locking.
    ///
    /// `None` also covers an in-flight retirement check; use
    /// [`get`](Self::get) or [`lock`](Self::lock) to wait for its outcome.
    #[inline]
    pub fn try_get(&self) -> Option<&T> {
        if self.is_present() {
            // SAFETY: PRESENT is only published after the slot was written,
            // and withdrawn before it is dropped. Destruction is `unsafe` and
            // its callers guarantee this reference is dead by then.
            Some(unsafe { slot::assume_init_ref(&self.slot) })
        } else {
            None
        }
    }

    /// Returns the value, waiting out an in-flight retirement check.
    ///
    /// # Panics
    /// Reading an empty cell is a fatal invariant violation.
    #[inline]
    #[track_caller]
    pub fn get(&self) -> &T {
        match self.try_get() {
            Some(value) => value,
            None => self.lock().get(),
        }
    }

    /// Enters the cell's critical section.
    ///
    /// Every construction and destruction happens inside a section, so a
    /// caller can combine several checks with one state change atomically.
    #[inline]
    pub fn lock(&self) -> CellSection<'_, T> {
        CellSection {
            cell: self,
            _guard: self.lock.lock(),
        }
    }

    /// Constructs the value with `init` unless one is already present.
    ///
    /// Returns the live value and whether this call constructed it. `init`
    /// runs at most once and only under the lock; if it panics the cell stays
    /// empty.
    pub fn construct_if_absent<F>(&self, init: F) -> (&T, bool)
    where
        F: FnOnce() -> T,
    {
        if let Some(value) = self.try_get() {
            return (value, false);
        }
        let mut section = self.lock();
        let constructed = section.construct_if_absent(init);
        (section.get(), constructed)
    }

    /// Destroys the value if present. Returns whether a value was dropped.
    ///
    /// # Safety
    /// No reference previously returned by [`get`](Self::get),
    /// [`try_get`](Self::try_get) or [`construct_if_absent`](Self::construct_if_absent)
    /// may be used after this call.
    pub unsafe fn destroy_if_present(&self) -> bool {
        // SAFETY: forwarded to the caller.
        unsafe { self.lock().destroy_if_present() }
    }
}

impl<T> Default for GuardedCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for GuardedCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == PRESENT {
            *self.state.get_mut() = EMPTY;
            // SAFETY: `&mut self` rules out readers; PRESENT means initialized.
            unsafe { slot::drop_in_place(&self.slot) };
        }
    }
}

/// Exclusive access to a [`GuardedCell`]'s construction and destruction.
///
/// Holding a section is also the proof other per-type state uses to mutate
/// data that must change together with the cell.
pub struct CellSection<'a, T> {
    cell: &'a GuardedCell<T>,
    _guard: RawLockGuard<'a>,
}

impl<'a, T> CellSection<'a, T> {
    /// Returns `true` if the cell currently holds a value.
    #[inline]
    pub fn is_present(&self) -> bool {
        // Only sections change the state, and we hold the only one.
        self.cell.state.load(Ordering::Relaxed) == PRESENT
    }

    /// Constructs the value with `init` if the cell is empty.
    ///
    /// Returns `true` if this call constructed the value.
    pub fn construct_if_absent<F>(&mut self, init: F) -> bool
    where
        F: FnOnce() -> T,
    {
        if self.is_present() {
            return false;
        }
        let value = init();
        // SAFETY: the cell is EMPTY and we hold its lock.
        unsafe { slot::write(&self.cell.slot, value) };
        self.cell.state.store(PRESENT, Ordering::SeqCst);
        true
    }

    /// Destroys the value if one is present and `still_unused` agrees.
    ///
    /// The value is withdrawn from lock-free readers *before* `still_unused`
    /// runs; if it returns `false` the value is published again untouched.
    /// Returns whether a value was dropped.
    ///
    /// # Safety
    /// If the value is dropped, no reference previously handed out by the cell
    /// may be used afterwards. `still_unused` is where callers establish that.
    pub unsafe fn destroy_if<P>(&mut self, still_unused: P) -> bool
    where
        P: FnOnce() -> bool,
    {
        if !self.is_present() {
            return false;
        }
        self.cell.state.store(RETIRING, Ordering::SeqCst);
        if !still_unused() {
            self.cell.state.store(PRESENT, Ordering::SeqCst);
            return false;
        }
        // EMPTY before the drop: a panicking destructor still leaves the cell
        // reusable. Readers that see EMPTY go on to take the lock we hold.
        self.cell.state.store(EMPTY, Ordering::SeqCst);
        // SAFETY: the value was PRESENT, we hold the lock, and the caller
        // promises no outstanding references are used afterwards.
        unsafe { slot::drop_in_place(&self.cell.slot) };
        true
    }

    /// Destroys the value if present. Returns whether a value was dropped.
    ///
    /// # Safety
    /// Same contract as [`GuardedCell::destroy_if_present`].
    pub unsafe fn destroy_if_present(&mut self) -> bool {
        // SAFETY: forwarded to the caller.
        unsafe { self.destroy_if(|| true) }
    }

    /// Returns the value, which lives as long as the cell.
    ///
    /// # Panics
    /// Reading an empty cell is a fatal invariant violation.
    #[inline]
    #[track_caller]
    pub fn get(&self) -> &'a T {
        if !self.is_present() {
            fatal(LifetimeViolation::ReadOfEmptyCell {
                type_name: core::any::type_name::<T>(),
            });
        }
        // SAFETY: PRESENT under the lock means initialized, and no section but
        // ours can drop it while we hold the lock.
        unsafe { slot::assume_init_ref(&self.cell.slot) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    struct Tracked<'a> {
        id: usize,
        drops: &'a AtomicUsize,
    }

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_empty_until_constructed() {
        let cell = GuardedCell::<u32>::new();
        assert!(!cell.is_present());
        assert!(cell.try_get().is_none());

        let (value, constructed) = cell.construct_if_absent(|| 7);
        assert!(constructed);
        assert_eq!(*value, 7);
        assert!(cell.is_present());
    }

    #[test]
    fn test_construct_if_absent_keeps_existing_value() {
        let cell = GuardedCell::new();
        cell.construct_if_absent(|| 1);
        let (value, constructed) = cell.construct_if_absent(|| panic!("must not run"));
        assert!(!constructed);
        assert_eq!(*value, 1);
    }

    #[test]
    fn test_destroy_then_reconstruct_reuses_slot() {
        let drops = AtomicUsize::new(0);
        let cell = GuardedCell::new();

        let (first, _) = cell.construct_if_absent(|| Tracked { id: 1, drops: &drops });
        let first_addr = first as *const Tracked<'_>;
        assert_eq!(first.id, 1);

        assert!(unsafe { cell.destroy_if_present() });
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(!cell.is_present());
        assert!(!unsafe { cell.destroy_if_present() });
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let (second, constructed) = cell.construct_if_absent(|| Tracked { id: 2, drops: &drops });
        assert!(constructed);
        assert_eq!(second.id, 2);
        assert_eq!(second as *const Tracked<'_>, first_addr);
    }

    #[test]
    fn test_panicking_initializer_leaves_cell_empty() {
        let cell = GuardedCell::<String>::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cell.construct_if_absent(|| panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(!cell.is_present());

        // The lock was released by unwinding.
        let (value, constructed) = cell.construct_if_absent(|| "ok".to_string());
        assert!(constructed);
        assert_eq!(value, "ok");
    }

    #[test]
    fn test_section_combines_check_and_destroy() {
        let cell = GuardedCell::new();
        cell.construct_if_absent(|| 5u8);
        {
            let mut section = cell.lock();
            assert!(section.is_present());
            assert_eq!(*section.get(), 5);
            assert!(unsafe { section.destroy_if_present() });
            assert!(!section.is_present());
            assert!(section.construct_if_absent(|| 6));
        }
        assert_eq!(*cell.get(), 6);
    }

    #[test]
    fn test_destroy_if_restores_value_when_predicate_refuses() {
        let drops = AtomicUsize::new(0);
        let cell = GuardedCell::new();
        cell.construct_if_absent(|| Tracked { id: 3, drops: &drops });

        let mut section = cell.lock();
        let destroyed = unsafe {
            section.destroy_if(|| {
                // Withdrawn from lock-free readers while the predicate runs.
                assert!(cell.try_get().is_none());
                false
            })
        };
        assert!(!destroyed);
        assert!(section.is_present());
        drop(section);

        assert_eq!(cell.get().id, 3);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_of_cell_drops_value() {
        let drops = AtomicUsize::new(0);
        {
            let cell = GuardedCell::new();
            cell.construct_if_absent(|| Tracked { id: 0, drops: &drops });
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "lifetime guard invariant violated")]
    fn test_get_on_empty_cell_is_fatal() {
        let cell = GuardedCell::<u64>::new();
        let _ = cell.get();
    }

    #[test]
    fn test_concurrent_construction_runs_once() {
        const THREADS: usize = 8;
        let cell = GuardedCell::new();
        let runs = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        let addrs: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|i| {
                    let (cell, runs, barrier) = (&cell, &runs, &barrier);
                    s.spawn(move || {
                        barrier.wait();
                        let (value, _) = cell.construct_if_absent(|| {
                            runs.fetch_add(1, Ordering::SeqCst);
                            i
                        });
                        value as *const usize as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }
}
