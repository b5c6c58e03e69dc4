//! Quark Core
//!
//! This crate provides the memory layer and reactive-state primitives for
//! the Quark state library. It implements:
//!
//! - An indirection layer mapping synthetic addresses to mutable values
//! - Change notification (watchers) on every write
//! - Incremental, yielding cleanup of stale address bookkeeping
//! - Reactive cells ([`Quark`]) and cell groups ([`Hadron`]) as thin
//!   facades over the memory layer
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - `memory`: addresses, handles, the value store, watchers, and the sweeper
//! - `cell`: the single-value reactive cell
//! - `group`: aggregation of many cells under one accessor object
//!
//! The memory layer is the only non-trivial subsystem; cells and groups are
//! pure composition over it.
//!
//! # Example
//!
//! ```rust
//! use quark_core::{Hadron, Memory};
//!
//! let memory = Memory::new();
//!
//! // A reactive cell
//! let count = memory.quark(0i32);
//! count.watch(|| println!("count changed"));
//! count.set(5); // Prints: "count changed"
//!
//! // A group of cells, sharing the cell's storage slot
//! let state = Hadron::builder(&memory).cell("count", &count).build();
//! state.set("count", 6i32).unwrap(); // Prints again; `count` sees 6
//! assert_eq!(*count.get().unwrap(), 6);
//! ```

pub mod cell;
pub mod group;
pub mod memory;

pub use cell::Quark;
pub use group::{Accessor, GroupError, Hadron, HadronBuilder};
pub use memory::{Address, Handle, Memory, SweepReport, Unwatch, Value, Watcher, SWEEP_BATCH_SIZE};
