//! Process-wide map from resource type to its [`LifetimeState`].
//!
//! Rust has no generic statics, so each `LifetimeState<T>` is allocated on
//! first use, leaked, and looked up by `TypeId` afterwards. Entries are never
//! removed: the leaked state is the one storage slot every era of `T` reuses.
//!
//! The map is append-only. Each bucket is a singly linked list of leaked
//! nodes whose head is an `AtomicPtr`; lookups walk it without locking.
//! Only inserting a new type takes `insert`, so registering one type never
//! stalls tokens or accessors of types that already exist.

use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Mutex, PoisonError};

use super::state::LifetimeState;
use crate::error::{fatal, LifetimeViolation};

type Entry = &'static (dyn Any + Send + Sync);

const BUCKETS: usize = 64;

struct Node {
    id: TypeId,
    entry: Entry,
    /// Fixed at insertion; nodes are immutable once published.
    next: *const Node,
}

struct Registry {
    buckets: [AtomicPtr<Node>; BUCKETS],
    insert: Mutex<()>,
}

static REGISTRY: Registry = Registry {
    buckets: [const { AtomicPtr::new(ptr::null_mut()) }; BUCKETS],
    insert: Mutex::new(()),
};

#[allow(clippy::cast_possible_truncation)]
fn bucket_of(id: TypeId) -> &'static AtomicPtr<Node> {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    &REGISTRY.buckets[hasher.finish() as usize % BUCKETS]
}

fn find(mut node: *const Node, id: TypeId) -> Option<Entry> {
    // SAFETY: nodes are leaked and never mutated after the Release store that
    // published them, which the caller's Acquire load synchronizes with.
    while let Some(current) = unsafe { node.as_ref() } {
        if current.id == id {
            return Some(current.entry);
        }
        node = current.next;
    }
    None
}

/// Returns the state of `T`, creating it on first request.
///
/// Concurrent first requests for the same `T` agree on a single state.
pub(crate) fn state_of<T: Send + Sync + 'static>() -> &'static LifetimeState<T> {
    let id = TypeId::of::<T>();
    let bucket = bucket_of(id);

    let entry = match find(bucket.load(Ordering::Acquire), id) {
        Some(entry) => entry,
        None => register(bucket, id, || {
            let state: Entry = Box::leak(Box::new(LifetimeState::<T>::new()));
            state
        }),
    };

    entry.downcast_ref::<LifetimeState<T>>().unwrap_or_else(|| {
        fatal(LifetimeViolation::RegistryTypeMismatch {
            type_name: core::any::type_name::<T>(),
        })
    })
}

#[cold]
fn register<F>(bucket: &'static AtomicPtr<Node>, id: TypeId, make: F) -> Entry
where
    F: FnOnce() -> Entry,
{
    // Nothing is left half-updated under this lock, so poisoning is harmless.
    let _insert = REGISTRY
        .insert
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    // Inserts are serialized, so this head is the one we publish over.
    let head = bucket.load(Ordering::Acquire);
    if let Some(entry) = find(head, id) {
        return entry;
    }
    let entry = make();
    let node: &'static mut Node = Box::leak(Box::new(Node {
        id,
        entry,
        next: head,
    }));
    bucket.store(node, Ordering::Release);
    entry
}

/// Holds the insertion lock until the guard drops.
#[cfg(test)]
pub(crate) fn hold_insert_lock() -> std::sync::MutexGuard<'static, ()> {
    REGISTRY
        .insert
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}
