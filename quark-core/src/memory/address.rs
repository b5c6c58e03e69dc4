//! Addresses and Address Allocation
//!
//! Every allocation is assigned a numeric address. Addresses exist so that a
//! storage slot can be referred to *out of band* — handed to another
//! subsystem, embedded in a message, printed in a log — and later resolved
//! back to a live handle via [`Memory::lookup`](super::Memory::lookup).
//!
//! Addresses are not capabilities: holding one does not keep the underlying
//! slot alive, and resolving a stale address simply yields nothing.
//!
//! # Uniqueness
//!
//! The allocator hands out strictly increasing integers starting at 0 and
//! never recycles them. Two handles may share an address only if a caller
//! deliberately bypasses the allocator with
//! [`Memory::allocate_at`](super::Memory::allocate_at); even then the handles
//! themselves remain distinct, because handle identity is never derived from
//! the address.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Numeric identifier attached to a handle at allocation time.
///
/// `Address` is plain data: `Copy`, hashable, ordered, and serializable. It
/// carries no liveness information — pair it with
/// [`Memory::lookup`](super::Memory::lookup) to find out whether the slot it
/// named still exists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Address(u64);

impl Address {
    /// Build an address from a raw integer.
    ///
    /// Intended for the explicit-address escape hatch and for round-tripping
    /// addresses that were previously obtained from [`Address::as_u64`].
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw integer value of this address.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<u64> for Address {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Issues monotonically increasing addresses for one [`Memory`](super::Memory).
///
/// Uses an atomic counter so allocation stays lock-free even when a memory is
/// shared across threads. The counter starts at 0 for every fresh allocator,
/// which is what makes address sequences reproducible in tests: each test
/// constructs its own `Memory` and therefore its own counter.
#[derive(Debug, Default)]
pub(crate) struct AddressAllocator {
    counter: AtomicU64,
}

impl AddressAllocator {
    /// Return the next unused address and advance the counter.
    pub(crate) fn next(&self) -> Address {
        Address(self.counter.fetch_add(1, Ordering::Relaxed))
    }
}
