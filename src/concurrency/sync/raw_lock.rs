//! [`RawLock`]: the critical section around cell construction and destruction.

use super::{wait_on_u32, wake_one_u32};
use crossbeam_utils::Backoff;
use std::sync::atomic::{AtomicU32, Ordering};

/// A word-sized blocking lock with no payload.
///
/// Spins briefly with exponential backoff, then parks the thread on the lock
/// word itself (futex on Linux, `WaitOnAddress` on Windows).
///
/// # States
/// - 0: Unlocked
/// - 1: Locked, no waiters (likely)
/// - 2: Locked, waiters exist (contended)
pub struct RawLock {
    state: AtomicU32,
}

impl RawLock {
    const UNLOCKED: u32 = 0;
    const LOCKED: u32 = 1;
    const CONTENDED: u32 = 2;

    /// Creates an unlocked lock.
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(Self::UNLOCKED),
        }
    }

    /// Acquires the lock, blocking the current thread until it is available.
    ///
    /// The lock is not reentrant: locking twice on one thread deadlocks.
    #[inline]
    pub fn lock(&self) -> RawLockGuard<'_> {
        if self
            .state
            .compare_exchange(Self::UNLOCKED, Self::LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_slow();
        }
        RawLockGuard { lock: self }
    }

    #[cold]
    fn lock_slow(&self) {
        let backoff = Backoff::new();
        while !backoff.is_completed() {
            if self.state.load(Ordering::Relaxed) == Self::UNLOCKED
                && self
                    .state
                    .compare_exchange_weak(
                        Self::UNLOCKED,
                        Self::LOCKED,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                return;
            }
            backoff.snooze();
        }

        // Park. Once we mark the word contended we keep it that way on
        // acquisition, since other parked threads may still exist.
        while self.state.swap(Self::CONTENDED, Ordering::Acquire) != Self::UNLOCKED {
            wait_on_u32(&self.state, Self::CONTENDED);
        }
    }

    #[inline]
    fn unlock(&self) {
        if self.state.swap(Self::UNLOCKED, Ordering::Release) == Self::CONTENDED {
            wake_one_u32(&self.state);
        }
    }
}

impl Default for RawLock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for a held [`RawLock`]; unlocks on drop.
#[must_use = "dropping the guard releases the lock immediately"]
pub struct RawLockGuard<'a> {
    lock: &'a RawLock,
}

impl Drop for RawLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::UnsafeCell;
    use std::thread;
    use std::time::Duration;

    struct Counter {
        lock: RawLock,
        value: UnsafeCell<u64>,
    }

    unsafe impl Sync for Counter {}

    #[test]
    fn test_lock_is_reusable_after_release() {
        let lock = RawLock::new();
        for _ in 0..3 {
            let guard = lock.lock();
            assert_eq!(lock.state.load(Ordering::Relaxed), RawLock::LOCKED);
            drop(guard);
            assert_eq!(lock.state.load(Ordering::Relaxed), RawLock::UNLOCKED);
        }
    }

    #[test]
    fn test_contended_lock_blocks() {
        let lock = RawLock::new();
        let lock = &lock;

        thread::scope(|s| {
            s.spawn(move || {
                let guard = lock.lock();
                thread::sleep(Duration::from_millis(50));
                drop(guard);
            });

            s.spawn(move || {
                thread::sleep(Duration::from_millis(10));
                // Should block until first thread releases
                let guard = lock.lock();
                drop(guard);
            });
        });

        assert_eq!(lock.state.load(Ordering::Relaxed), RawLock::UNLOCKED);
    }

    #[test]
    fn test_mutual_exclusion() {
        let counter = Counter {
            lock: RawLock::new(),
            value: UnsafeCell::new(0),
        };
        let counter = &counter;

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(move || {
                    for _ in 0..1000 {
                        let _guard = counter.lock.lock();
                        unsafe { *counter.value.get() += 1 };
                    }
                });
            }
        });

        assert_eq!(unsafe { *counter.value.get() }, 8000);
    }
}
