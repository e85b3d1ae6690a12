//! Blocking building blocks: address-based waiting and the raw lock built on it.

pub mod raw_lock;

pub use raw_lock::{RawLock, RawLockGuard};

use core::sync::atomic::AtomicU32;
#[cfg(not(windows))]
use core::sync::atomic::Ordering;

#[cfg(windows)]
use windows_sys::Win32::System::Threading::{
    WaitOnAddress, WakeByAddressSingle, INFINITE,
};

#[cfg(target_os = "linux")]
use libc::{SYS_futex, FUTEX_PRIVATE_FLAG, FUTEX_WAIT, FUTEX_WAKE};

#[cfg(target_os = "linux")]
#[inline]
fn futex_wait(addr: *const u32, expected: u32) {
    // A spurious return (EINTR, EAGAIN) is fine: callers re-check in a loop.
    unsafe {
        libc::syscall(
            SYS_futex,
            addr,
            FUTEX_WAIT | FUTEX_PRIVATE_FLAG,
            expected,
            core::ptr::null::<libc::timespec>(),
        );
    }
}

#[cfg(target_os = "linux")]
#[inline]
fn futex_wake(addr: *const u32, count: i32) {
    unsafe {
        libc::syscall(SYS_futex, addr, FUTEX_WAKE | FUTEX_PRIVATE_FLAG, count);
    }
}

/// Wakes one thread waiting on the given address.
#[inline]
pub fn wake_one_u32(addr: &AtomicU32) {
    #[cfg(windows)]
    unsafe {
        WakeByAddressSingle(addr.as_ptr().cast_const().cast());
    }
    #[cfg(target_os = "linux")]
    {
        futex_wake(addr.as_ptr(), 1);
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    let _ = addr;
}

/// Blocks while the value at `addr` equals `expected`.
///
/// May return spuriously; callers must re-check their condition.
#[inline]
pub fn wait_on_u32(addr: &AtomicU32, expected: u32) {
    #[cfg(windows)]
    unsafe {
        let expected_ptr = (&expected as *const u32).cast();
        WaitOnAddress(
            addr.as_ptr().cast_const().cast(),
            expected_ptr,
            core::mem::size_of::<u32>(),
            INFINITE,
        );
    }
    #[cfg(target_os = "linux")]
    {
        if addr.load(Ordering::Acquire) == expected {
            futex_wait(addr.as_ptr(), expected);
        }
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    while addr.load(Ordering::Acquire) == expected {
        std::thread::yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_wait_on_u32_wake() {
        let flag = Arc::new(AtomicU32::new(0));
        let barrier = Arc::new(Barrier::new(2));
        let flag_thread = flag.clone();
        let barrier_thread = barrier.clone();

        let handle = thread::spawn(move || {
            barrier_thread.wait();
            while flag_thread.load(Ordering::Acquire) == 0 {
                wait_on_u32(&flag_thread, 0);
            }
            flag_thread.load(Ordering::Acquire)
        });

        barrier.wait();
        flag.store(1, Ordering::Release);
        wake_one_u32(&flag);

        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn test_wait_returns_immediately_on_mismatch() {
        let flag = AtomicU32::new(7);
        wait_on_u32(&flag, 0);
        wake_one_u32(&flag);
        assert_eq!(flag.load(Ordering::Relaxed), 7);
    }
}
