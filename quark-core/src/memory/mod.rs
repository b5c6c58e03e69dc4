//! The Memory Layer
//!
//! This module implements the indirection layer everything else in the crate
//! is built on: synthetic addresses mapped to mutable, watchable values.
//!
//! # Concepts
//!
//! ## Handles and addresses
//!
//! Allocation stores a value and returns a [`Handle`] — an opaque token
//! whose identity is the key to the storage. The handle carries a numeric
//! [`Address`] usable for out-of-band lookup, but equality between handles
//! is by identity, never by address.
//!
//! ## Ownership
//!
//! The handle *is* the ownership: the stored value and its watcher set live
//! only as long as some handle clone does. The memory context itself holds
//! nothing but weak references, so parking a value in the store never leaks
//! it — drop the handle and the value goes with it.
//!
//! ## Watching
//!
//! [`Memory::watch`] attaches a zero-argument callback that fires
//! synchronously on every [`Memory::write`] to the same handle, after the
//! new value is in place. De-registration is explicit via the returned
//! [`Unwatch`] token.
//!
//! ## Sweeping
//!
//! Dropped handles leave stale entries in the address index. They are
//! harmless (lookups report absent) but accumulate; [`Memory::sweep`] purges
//! them in yielding, fixed-size batches.

mod address;
mod handle;
mod store;
mod sweep;

pub use address::Address;
pub use handle::{Handle, Unwatch, Value, Watcher};
pub use store::Memory;
pub use sweep::{SweepReport, SWEEP_BATCH_SIZE};
