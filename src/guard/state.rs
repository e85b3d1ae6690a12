//! Per-type lifetime state: the counter, the cell and the current anchor.

use core::cell::UnsafeCell;
use core::mem;
use core::sync::atomic::{AtomicU64, Ordering};

use super::counter::ReferenceCounter;
use super::StaticLifetimeGuard;
use crate::cell::{CellSection, GuardedCell};
use crate::diagnostics::{trace_event, GuardSnapshot};

/// Everything one resource type `T` shares process-wide.
///
/// Lives in the registry for the rest of the process; every construction era
/// of `T` reuses this same storage.
pub(crate) struct LifetimeState<T: Send + Sync + 'static> {
    pub(crate) counter: ReferenceCounter,
    cell: GuardedCell<T>,
    /// Only accessed while holding `cell`'s lock.
    anchor: UnsafeCell<Option<StaticLifetimeGuard<T>>>,
    generation: AtomicU64,
}

// SAFETY: `anchor` is only touched through `anchor_slot`, which requires a
// `CellSection` of this state's cell.
unsafe impl<T: Send + Sync + 'static> Send for LifetimeState<T> {}
unsafe impl<T: Send + Sync + 'static> Sync for LifetimeState<T> {}

impl<T: Send + Sync + 'static> LifetimeState<T> {
    pub(crate) fn new() -> Self {
        Self {
            counter: ReferenceCounter::new(core::any::type_name::<T>()),
            cell: GuardedCell::new(),
            anchor: UnsafeCell::new(None),
            generation: AtomicU64::new(0),
        }
    }

    #[inline]
    fn anchor_slot<'s>(
        &'s self,
        _section: &'s mut CellSection<'_, T>,
    ) -> &'s mut Option<StaticLifetimeGuard<T>> {
        // SAFETY: the section holds this cell's lock and is borrowed mutably
        // for as long as the returned reference lives.
        unsafe { &mut *self.anchor.get() }
    }

    #[inline]
    pub(crate) fn is_constructed(&self) -> bool {
        self.cell.is_present()
    }

    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns the live resource, constructing it with `init` and anchoring a
    /// new era if it is absent.
    ///
    /// A caller holding a token incremented the count before this reads the
    /// cell state. A concurrent release publishes RETIRING before it reads the
    /// count. With both sides sequentially consistent, either the release sees
    /// our unit and keeps the value, or we see it withdrawn and wait on the lock.
    pub(crate) fn instance_with<F>(&'static self, init: F) -> &'static T
    where
        F: FnOnce() -> T,
    {
        if let Some(value) = self.cell.try_get() {
            return value;
        }

        let mut section = self.cell.lock();
        if section.construct_if_absent(init) {
            self.generation.fetch_add(1, Ordering::AcqRel);
            let anchor = StaticLifetimeGuard::attach(self);
            if let Some(stale) = self.anchor_slot(&mut section).replace(anchor) {
                // A previous era's anchor whose unit was already overridden.
                mem::forget(stale);
            }
            trace_event!(
                type_name = self.counter.type_name(),
                generation = self.generation.load(Ordering::Relaxed),
                count = self.counter.read(),
                "constructed and anchored"
            );
        }
        section.get()
    }

    /// Destroys the resource unless a token reappeared since the caller
    /// observed the 1→0 transition.
    pub(crate) fn release_if_unreferenced(&self) {
        let mut section = self.cell.lock();
        // SAFETY: the value is withdrawn before the count is read, so a token
        // created concurrently is either counted here or finds the value gone.
        // Token-less references only dangle through the `unsafe` overrides,
        // whose callers vouch that none are still in use.
        let destroyed = unsafe { section.destroy_if(|| self.counter.read() == 0) };
        if destroyed {
            if let Some(stale) = self.anchor_slot(&mut section).take() {
                // The count reached zero with the anchor still stored, so its
                // unit was overridden. Releasing it again would underflow.
                mem::forget(stale);
            }
            trace_event!(
                type_name = self.counter.type_name(),
                generation = self.generation.load(Ordering::Relaxed),
                "destroyed"
            );
        }
    }

    /// Drops the current era's anchor token. Returns whether one existed.
    ///
    /// # Safety
    /// If this drops the last unit the resource is destroyed; no reference to
    /// it may be used afterwards.
    pub(crate) unsafe fn release_anchor(&self) -> bool {
        let anchor = {
            let mut section = self.cell.lock();
            self.anchor_slot(&mut section).take()
        };
        match anchor {
            Some(anchor) => {
                trace_event!(
                    type_name = self.counter.type_name(),
                    count = self.counter.read(),
                    "anchor released"
                );
                // Dropped outside the lock: the drop may itself destroy.
                drop(anchor);
                true
            }
            None => false,
        }
    }

    pub(crate) fn snapshot(&self) -> GuardSnapshot {
        let mut section = self.cell.lock();
        let anchored = self.anchor_slot(&mut section).is_some();
        GuardSnapshot {
            type_name: self.counter.type_name().to_string(),
            count: self.counter.read(),
            constructed: section.is_present(),
            generation: self.generation.load(Ordering::Acquire),
            anchored,
        }
    }
}
