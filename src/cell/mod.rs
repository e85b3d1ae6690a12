//! Storage for resources that can be constructed, destroyed and reborn.
//!
//! - `slot` is the minimal unsafe layer over `MaybeUninit<T>`.
//! - `guarded_cell` adds the EMPTY/PRESENT/RETIRING state machine and the lock.

pub mod guarded_cell;
pub(crate) mod slot;

pub use guarded_cell::{CellSection, GuardedCell};
