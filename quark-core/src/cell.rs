//! Quark: the Reactive Cell
//!
//! A [`Quark`] wraps exactly one handle and gives it a typed get/set/watch
//! surface. It is a pure facade: every operation is a direct translation
//! into one memory-layer primitive, and the cell holds no state of its own
//! beyond the handle and a clone of the memory context.
//!
//! Cloning a quark clones the handle, so clones observe and mutate the same
//! storage slot. The underlying [`Handle`] is exposed so aggregators (see
//! [`Hadron`](crate::group::Hadron)) can share the slot instead of copying
//! state.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::memory::{Address, Handle, Memory, Unwatch, Watcher};

/// A single-value reactive cell over one storage slot.
///
/// # Example
///
/// ```rust
/// use quark_core::{Memory, Quark};
///
/// let memory = Memory::new();
/// let count: Quark<i32> = memory.quark(0);
///
/// count.set(5);
/// assert_eq!(*count.get().unwrap(), 5);
/// ```
pub struct Quark<T> {
    memory: Memory,
    handle: Handle,
    _value: PhantomData<fn() -> T>,
}

impl<T> Quark<T>
where
    T: Send + Sync + 'static,
{
    /// Allocate a new cell holding `initial`.
    pub fn new(memory: &Memory, initial: T) -> Self {
        let handle = memory.allocate(Arc::new(initial));
        Self {
            memory: memory.clone(),
            handle,
            _value: PhantomData,
        }
    }

    /// The underlying handle. Shared, not copied, by anything that wants the
    /// same storage slot.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The cell's address in its memory context.
    pub fn address(&self) -> Address {
        self.handle.address()
    }

    /// The current value, or `None` if the cell's handle was deallocated.
    pub fn get(&self) -> Option<Arc<T>> {
        self.memory
            .dereference(&self.handle)
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Replace the value, firing every watcher on this cell's handle.
    pub fn set(&self, value: T) {
        self.memory.write(&self.handle, Arc::new(value));
    }

    /// Read-modify-write convenience. Does nothing if the cell is absent.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        if let Some(current) = self.get() {
            self.set(f(&current));
        }
    }

    /// Register a callback invoked after every [`Quark::set`] (or any direct
    /// write to the shared handle). De-register via the returned token.
    pub fn watch<F>(&self, callback: F) -> Unwatch
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: Watcher = Arc::new(callback);
        self.memory.watch(&self.handle, callback)
    }
}

impl Memory {
    /// Allocate a new [`Quark`] in this memory. Equivalent to
    /// [`Quark::new`].
    pub fn quark<T>(&self, initial: T) -> Quark<T>
    where
        T: Send + Sync + 'static,
    {
        Quark::new(self, initial)
    }
}

impl<T> Clone for Quark<T> {
    fn clone(&self) -> Self {
        Self {
            memory: self.memory.clone(),
            handle: self.handle.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Quark<T>
where
    T: std::fmt::Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quark")
            .field("address", &self.address())
            .field("value", &self.get())
            .finish()
    }
}
