//! The Memory Store
//!
//! [`Memory`] is the explicit context object tying the layer together: the
//! address allocator plus the address index. All primitive operations —
//! allocate, deallocate, dereference, write, watch, lookup — live here.
//!
//! There is deliberately no process-wide memory: each `Memory` is its own
//! address space with its own counter, constructed wherever the application
//! (or a test) wants an isolated one. Cloning a `Memory` is cheap and yields
//! another reference to the same address space.
//!
//! # Liveness
//!
//! The store never keeps a stored value alive on its own. Values and
//! watchers live inside the slot owned by the [`Handle`] clones; the address
//! index holds only `Weak` references. Once the last handle clone drops, the
//! value is freed immediately and the index entry goes stale — stale entries
//! resolve to "absent" on [`Memory::lookup`] and are purged in bulk by the
//! [sweeper](crate::memory::SweepReport).

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::trace;

use super::address::{Address, AddressAllocator};
use super::handle::{Handle, Slot, Unwatch, Value, Watcher};

/// An isolated address space: allocator, value storage, watcher registry,
/// and address index behind one cheaply-clonable context object.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use quark_core::Memory;
///
/// let memory = Memory::new();
/// let handle = memory.allocate(Arc::new(41i32));
///
/// memory.write(&handle, Arc::new(42i32));
/// let value = memory.dereference(&handle).unwrap();
/// assert_eq!(*value.downcast::<i32>().ok().unwrap(), 42);
/// ```
#[derive(Clone, Default)]
pub struct Memory {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    allocator: AddressAllocator,
    /// Address → weak slot reference. Entries go stale when the last handle
    /// clone drops; stale entries are invisible to `lookup` and are removed
    /// by `deallocate` or a sweep pass.
    addresses: DashMap<Address, Weak<Slot>>,
}

impl Memory {
    /// Create a fresh, empty address space. Addresses start at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under a freshly allocated address and return the handle.
    ///
    /// Allocation cannot fail and the address sequence is strictly
    /// increasing: 0, 1, 2, … for the lifetime of this `Memory`.
    pub fn allocate(&self, value: Value) -> Handle {
        self.install(self.inner.allocator.next(), value)
    }

    /// Store `value` under a caller-chosen address.
    ///
    /// Escape hatch for callers that manage their own address space. The
    /// allocator is bypassed entirely; if the address is already indexed,
    /// the old entry is displaced (its handle stays usable but is no longer
    /// reachable by address). Collision avoidance is the caller's job.
    pub fn allocate_at(&self, value: Value, address: Address) -> Handle {
        self.install(address, value)
    }

    fn install(&self, address: Address, value: Value) -> Handle {
        let slot = Arc::new(Slot::new(address, value));
        self.inner.addresses.insert(address, Arc::downgrade(&slot));
        trace!(%address, "allocated");
        Handle::new(slot)
    }

    /// The value currently stored for `handle`, or `None` if the handle was
    /// deallocated. Never fails; returns the identical `Arc` that was
    /// stored, not a copy of the data.
    pub fn dereference(&self, handle: &Handle) -> Option<Value> {
        handle.slot.read()
    }

    /// Replace the stored value and synchronously invoke every watcher
    /// registered on `handle`.
    ///
    /// Watchers run after the value is in place, so a watcher that
    /// dereferences from inside its callback observes the new value. No
    /// invocation order is guaranteed. Writing a deallocated handle is a
    /// silent no-op: the value is not stored and no watcher fires.
    pub fn write(&self, handle: &Handle, value: Value) {
        if handle.slot.replace(value) {
            handle.slot.notify();
        }
    }

    /// Register `callback` to run on every subsequent write to `handle`.
    ///
    /// Set semantics: registering the identical callback (same `Arc`) twice
    /// returns a token for the existing registration instead of subscribing
    /// it twice. Watching a deallocated handle registers nothing and returns
    /// an inert token. The registration does not keep the handle alive.
    pub fn watch(&self, handle: &Handle, callback: Watcher) -> Unwatch {
        match handle.slot.add_watcher(callback) {
            Some(id) => Unwatch::new(&handle.slot, id),
            None => Unwatch::inert(),
        }
    }

    /// Remove the stored value, the watcher set, and the address-index entry
    /// for `handle`. Idempotent: deallocating twice is a no-op.
    ///
    /// Watchers are dropped without a terminal notification; after this
    /// call, no watcher ever fires for the handle again.
    pub fn deallocate(&self, handle: &Handle) {
        handle.slot.clear();
        // Remove the index entry only if it still points at this slot; an
        // explicit-address collision may have displaced it with another one.
        self.inner
            .addresses
            .remove_if(&handle.address(), |_, weak| {
                std::ptr::eq(weak.as_ptr(), Arc::as_ptr(&handle.slot))
            });
        trace!(address = %handle.address(), "deallocated");
    }

    /// Resolve a plain address back to its handle.
    ///
    /// Returns `None` if the address was never issued, the handle was
    /// deallocated, or every handle clone has been dropped (a stale index
    /// entry — not an error, just absent).
    pub fn lookup(&self, address: Address) -> Option<Handle> {
        let slot = self.inner.addresses.get(&address)?.upgrade()?;
        if slot.read().is_none() {
            return None;
        }
        Some(Handle::new(slot))
    }

    /// Number of entries currently in the address index, stale ones
    /// included. Observability for tests, benchmarks, and sweep policy.
    pub fn address_count(&self) -> usize {
        self.inner.addresses.len()
    }

    pub(crate) fn snapshot_addresses(&self) -> Vec<Address> {
        self.inner.addresses.iter().map(|entry| *entry.key()).collect()
    }

    /// Remove the index entry for `address` if its slot has been reclaimed.
    /// Returns `true` if an entry was removed.
    pub(crate) fn purge_if_stale(&self, address: Address) -> bool {
        self.inner
            .addresses
            .remove_if(&address, |_, weak| weak.upgrade().is_none())
            .is_some()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("address_count", &self.address_count())
            .finish()
    }
}
