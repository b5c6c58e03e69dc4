//! Handles and Storage Slots
//!
//! A [`Handle`] is the opaque token returned by allocation. It is the *only*
//! thing that keeps a stored value alive: the handle owns the storage slot
//! through an `Arc`, the address index holds merely a `Weak` to it, and the
//! watcher set lives inside the slot itself. Drop the last handle clone and
//! the value plus every registered watcher are freed with it — no registry
//! anywhere retains a stored value on its own.
//!
//! # Identity
//!
//! Two handles are equal only when they share the same slot allocation
//! (`Arc::ptr_eq`). The address is never consulted for equality or hashing,
//! so even deliberately colliding addresses (via the explicit-address escape
//! hatch) cannot make two handles alias.
//!
//! # Watchers
//!
//! Watchers are zero-argument callbacks invoked synchronously after each
//! write. The set has set semantics keyed on callback identity: registering
//! the same `Arc`'d callback twice yields the original registration instead
//! of a duplicate subscription. Callbacks are invoked with no lock held, so a
//! watcher may freely dereference, write other handles, or register and
//! remove watchers from inside its body.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::address::Address;

/// A stored value: arbitrary shared data, erased behind `Any`.
///
/// Values round-trip by identity — dereferencing returns a clone of the same
/// `Arc` that was stored, never a copy of the data.
pub type Value = Arc<dyn Any + Send + Sync>;

/// A watcher callback, invoked with no arguments after every write.
pub type Watcher = Arc<dyn Fn() + Send + Sync>;

struct WatcherEntry {
    id: u64,
    callback: Watcher,
}

/// The storage cell behind one handle.
///
/// Holds the value (`None` once deallocated) and the watcher set. Owned
/// exclusively by the [`Handle`] clones pointing at it; everything else in
/// the memory layer refers to it weakly.
pub(crate) struct Slot {
    address: Address,
    value: RwLock<Option<Value>>,
    watchers: Mutex<SmallVec<[WatcherEntry; 2]>>,
    next_watcher_id: AtomicU64,
}

impl Slot {
    pub(crate) fn new(address: Address, value: Value) -> Self {
        Self {
            address,
            value: RwLock::new(Some(value)),
            watchers: Mutex::new(SmallVec::new()),
            next_watcher_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn address(&self) -> Address {
        self.address
    }

    /// The current value, or `None` once the slot has been deallocated.
    pub(crate) fn read(&self) -> Option<Value> {
        self.value.read().clone()
    }

    /// Replace the value. Returns `false` without storing anything if the
    /// slot was already deallocated — a dead slot never comes back to life,
    /// which is what guarantees its watchers can never fire again.
    pub(crate) fn replace(&self, value: Value) -> bool {
        let mut guard = self.value.write();
        if guard.is_none() {
            return false;
        }
        *guard = Some(value);
        true
    }

    /// Invoke every registered watcher.
    ///
    /// The set is snapshotted under the lock and the callbacks run after it
    /// is released, so reentrant watch/unwatch/write from inside a callback
    /// cannot deadlock.
    pub(crate) fn notify(&self) {
        let snapshot: SmallVec<[Watcher; 2]> = self
            .watchers
            .lock()
            .iter()
            .map(|entry| Arc::clone(&entry.callback))
            .collect();
        for callback in snapshot {
            callback();
        }
    }

    /// Register a watcher, deduplicating by callback identity.
    ///
    /// Returns the id of the (new or pre-existing) registration, or `None`
    /// if the slot is dead and the callback was not registered.
    pub(crate) fn add_watcher(&self, callback: Watcher) -> Option<u64> {
        if self.value.read().is_none() {
            return None;
        }
        let mut watchers = self.watchers.lock();
        if let Some(existing) = watchers
            .iter()
            .find(|entry| Arc::ptr_eq(&entry.callback, &callback))
        {
            return Some(existing.id);
        }
        let id = self.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        watchers.push(WatcherEntry { id, callback });
        Some(id)
    }

    /// Remove a watcher registration by id. Removing an id that is no longer
    /// present is a no-op.
    pub(crate) fn remove_watcher(&self, id: u64) {
        self.watchers.lock().retain(|entry| entry.id != id);
    }

    /// Deallocate: drop the value and the entire watcher set. Idempotent.
    pub(crate) fn clear(&self) {
        *self.value.write() = None;
        self.watchers.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.watchers.lock().len()
    }
}

/// Opaque identity-bearing token returned by allocation.
///
/// Cloning a handle is cheap and yields another reference to the same slot.
/// Equality and hashing are by slot identity, never by address.
#[derive(Clone)]
pub struct Handle {
    pub(crate) slot: Arc<Slot>,
}

impl Handle {
    pub(crate) fn new(slot: Arc<Slot>) -> Self {
        Self { slot }
    }

    /// The address assigned at allocation time. Never changes.
    pub fn address(&self) -> Address {
        self.slot.address()
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.slot).hash(state);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("address", &self.address())
            .field("live", &self.slot.read().is_some())
            .finish()
    }
}

/// De-registration token returned by `watch`.
///
/// Calling [`Unwatch::unwatch`] removes the registration; calling it again —
/// or calling it after the slot was deallocated or reclaimed — is a no-op.
/// Dropping the token does *not* unsubscribe; de-registration is always
/// explicit.
pub struct Unwatch {
    slot: Weak<Slot>,
    id: u64,
}

impl Unwatch {
    pub(crate) fn new(slot: &Arc<Slot>, id: u64) -> Self {
        Self {
            slot: Arc::downgrade(slot),
            id,
        }
    }

    /// A token that de-registers nothing, for watch calls that registered
    /// nothing (watching an already-deallocated handle).
    pub(crate) fn inert() -> Self {
        Self {
            slot: Weak::new(),
            id: 0,
        }
    }

    /// Remove the watcher registration this token refers to. Idempotent.
    pub fn unwatch(&self) {
        if let Some(slot) = self.slot.upgrade() {
            slot.remove_watcher(self.id);
        }
    }
}

impl fmt::Debug for Unwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unwatch")
            .field("id", &self.id)
            .field("attached", &(self.slot.upgrade().is_some()))
            .finish()
    }
}
