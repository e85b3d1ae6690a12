//! Concurrency helpers used by the per-type lifetime state.
//!
//! The guarded cell needs a short, bounded critical section around
//! construction and destruction. Everything here exists to provide it.

pub mod sync;

pub use sync::{RawLock, RawLockGuard};
