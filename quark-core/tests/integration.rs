//! Integration Tests for the Memory Layer and Its Facades
//!
//! These tests verify the end-to-end contracts: address allocation, identity
//! round-trips, write visibility, watcher semantics, cell/group pass-through,
//! and sweeper behavior — each against a fresh, isolated `Memory`.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use quark_core::{Address, Hadron, Memory, Value, Watcher};

/// Sequential allocations receive consecutive addresses starting at 0.
#[test]
fn allocation_addresses_are_strictly_increasing() {
    let memory = Memory::new();

    let mut previous = memory.allocate(Arc::new(())).address();
    assert_eq!(previous, Address::from_u64(0));

    for _ in 0..50 {
        let next = memory.allocate(Arc::new(())).address();
        assert_eq!(next.as_u64(), previous.as_u64() + 1);
        previous = next;
    }
}

/// Dereferencing returns the very value that was stored, not a copy.
#[test]
fn round_trip_preserves_identity() {
    let memory = Memory::new();
    let original: Value = Arc::new(vec![1, 2, 3]);

    let handle = memory.allocate(Arc::clone(&original));
    let retrieved = memory.dereference(&handle).unwrap();

    assert!(Arc::ptr_eq(&original, &retrieved));
}

/// A write is visible to the next dereference.
#[test]
fn write_visibility() {
    let memory = Memory::new();
    let handle = memory.allocate(Arc::new(String::from("v1")));

    memory.write(&handle, Arc::new(String::from("v2")));

    let value = memory.dereference(&handle).unwrap();
    assert_eq!(*value.downcast::<String>().ok().unwrap(), "v2");
}

/// Deallocation makes the value absent through every access path.
#[test]
fn deallocation_makes_values_absent() {
    let memory = Memory::new();
    let handle = memory.allocate(Arc::new(1i32));
    let address = handle.address();

    memory.deallocate(&handle);

    assert!(memory.dereference(&handle).is_none());
    assert!(memory.lookup(address).is_none());
}

/// One watcher registration fires exactly once per write, and not at all
/// after unsubscribing.
#[test]
fn watcher_firing_count() {
    let memory = Memory::new();
    let handle = memory.allocate(Arc::new(0i32));

    let calls = Arc::new(AtomicI32::new(0));
    let calls_clone = calls.clone();
    let unwatch = memory.watch(
        &handle,
        Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }),
    );

    memory.write(&handle, Arc::new(1i32));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    memory.write(&handle, Arc::new(2i32));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    unwatch.unwatch();
    memory.write(&handle, Arc::new(3i32));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Registering the identical callback twice must not double the invocations.
#[test]
fn duplicate_watcher_registration_is_a_no_op() {
    let memory = Memory::new();
    let handle = memory.allocate(Arc::new(0i32));

    let calls = Arc::new(AtomicI32::new(0));
    let calls_clone = calls.clone();
    let callback: Watcher = Arc::new(move || {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });

    let first = memory.watch(&handle, Arc::clone(&callback));
    let _second = memory.watch(&handle, Arc::clone(&callback));

    memory.write(&handle, Arc::new(1i32));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Either token removes the single registration.
    first.unwatch();
    memory.write(&handle, Arc::new(2i32));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// A cell grouped into a hadron shares its storage slot: mutation through
/// the group is mutation of the cell, and vice versa.
#[test]
fn cell_and_group_share_one_slot() {
    let memory = Memory::new();
    let a = memory.quark(1i32);

    let group = Hadron::builder(&memory).cell("a", &a).build();

    group.set("a", 2i32).unwrap();
    assert_eq!(*group.get_as::<i32>("a").unwrap(), 2);
    assert_eq!(*a.get().unwrap(), 2);

    a.set(3);
    assert_eq!(*group.get_as::<i32>("a").unwrap(), 3);
}

/// Watchers registered on a cell fire on writes made through a group view.
#[test]
fn group_writes_reach_cell_watchers() {
    let memory = Memory::new();
    let a = memory.quark(0i32);
    let group = Hadron::builder(&memory).cell("a", &a).build();

    let calls = Arc::new(AtomicI32::new(0));
    let calls_clone = calls.clone();
    a.watch(move || {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });

    group.set("a", 1i32).unwrap();
    group.set("a", 2i32).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// A group stored in memory is recoverable from its address alone.
#[test]
fn group_round_trips_through_lookup() {
    let memory = Memory::new();
    let a = memory.quark(10i32);
    let address = Hadron::builder(&memory).cell("a", &a).build().address();

    let handle = memory.lookup(address).unwrap();
    let group = Hadron::from_handle(&memory, &handle).unwrap();

    group.set("a", 11i32).unwrap();
    assert_eq!(*a.get().unwrap(), 11);
}

/// Sweeping removes reclaimed entries' bookkeeping and leaves live entries
/// resolvable.
#[tokio::test]
async fn sweep_keeps_live_entries_resolvable() {
    let memory = Memory::new();

    let live: Vec<_> = (0..10).map(|i| memory.allocate(Arc::new(i))).collect();
    let dead_addresses: Vec<Address> = (0..10)
        .map(|i| memory.allocate(Arc::new(i)).address())
        .collect();

    assert_eq!(memory.address_count(), 20);

    let report = memory.sweep().await;
    assert_eq!(report.scanned, 20);
    assert_eq!(report.reclaimed, 10);
    assert_eq!(memory.address_count(), 10);

    for handle in &live {
        assert_eq!(memory.lookup(handle.address()).unwrap(), *handle);
    }
    for address in dead_addresses {
        assert!(memory.lookup(address).is_none());
    }
}

/// A multi-batch pass (batch size smaller than the index) still covers the
/// whole snapshot.
#[tokio::test]
async fn sweep_completes_across_batches() {
    let memory = Memory::new();
    for i in 0..100 {
        drop(memory.allocate(Arc::new(i)));
    }

    let report = memory.sweep_batched(7).await;
    assert_eq!(report.scanned, 100);
    assert_eq!(report.reclaimed, 100);
    assert_eq!(memory.address_count(), 0);
}

/// Dropping every handle to a value frees it even while the address index
/// still carries the (now stale) entry.
#[test]
fn store_does_not_keep_values_alive() {
    let memory = Memory::new();
    let payload = Arc::new(String::from("payload"));
    let weak_payload = Arc::downgrade(&payload);

    let handle = memory.allocate(payload);

    let calls = Arc::new(AtomicI32::new(0));
    let calls_clone = calls.clone();
    memory.watch(
        &handle,
        Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }),
    );

    // Neither the store, the watcher registry, nor the index pins the slot.
    drop(handle);
    assert!(weak_payload.upgrade().is_none());
}

/// Two memories are fully isolated address spaces.
#[test]
fn memories_are_isolated() {
    let a = Memory::new();
    let b = Memory::new();

    let handle_a = a.allocate(Arc::new(1i32));
    let handle_b = b.allocate(Arc::new(2i32));

    assert_eq!(handle_a.address(), handle_b.address());
    assert_ne!(handle_a, handle_b);

    // Each memory resolves its own handle for the shared address value.
    assert_eq!(a.lookup(Address::from_u64(0)).unwrap(), handle_a);
    assert_eq!(b.lookup(Address::from_u64(0)).unwrap(), handle_b);
}

/// A watcher observing through `dereference` inside its callback sees the
/// value the triggering write installed.
#[test]
fn watchers_observe_the_new_value() {
    let memory = Memory::new();
    let handle = memory.allocate(Arc::new(0i32));

    let seen = Arc::new(AtomicI32::new(-1));
    let seen_clone = seen.clone();
    let memory_clone = memory.clone();
    let handle_clone = handle.clone();
    memory.watch(
        &handle,
        Arc::new(move || {
            let value = memory_clone.dereference(&handle_clone).unwrap();
            seen_clone.store(*value.downcast::<i32>().ok().unwrap(), Ordering::SeqCst);
        }),
    );

    memory.write(&handle, Arc::new(99i32));
    assert_eq!(seen.load(Ordering::SeqCst), 99);
}
