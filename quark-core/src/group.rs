//! Hadron: the Cell Group
//!
//! A [`Hadron`] consolidates several cells under one accessor object: for
//! every key it carries a `{get, set}` pair closing over the corresponding
//! cell's handle. Group membership is a view, not a copy — setting a field
//! through the group writes the original cell's slot, and the cell (and any
//! other group sharing it) observes the change immediately.
//!
//! The accessor table is itself allocated into the memory, so a group is a
//! storable unit like any other value: its handle can be parked in another
//! cell, nested inside another group, or recovered later by address with
//! [`Memory::lookup`] + [`Hadron::from_handle`].

use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::cell::Quark;
use crate::memory::{Address, Handle, Memory, Value};

/// Error raised when addressing a field the group does not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("no field named `{0}` in this group")]
    UnknownField(String),
}

/// Type-erased `{get, set}` pair for one group field.
///
/// Both closures capture the field's cell handle, so the accessor keeps the
/// underlying slot alive for as long as the group's table exists.
pub struct Accessor {
    get: Arc<dyn Fn() -> Option<Value> + Send + Sync>,
    set: Arc<dyn Fn(Value) + Send + Sync>,
}

impl Accessor {
    fn over(memory: &Memory, handle: &Handle) -> Self {
        let get_memory = memory.clone();
        let get_handle = handle.clone();
        let set_memory = memory.clone();
        let set_handle = handle.clone();
        Self {
            get: Arc::new(move || get_memory.dereference(&get_handle)),
            set: Arc::new(move |value| set_memory.write(&set_handle, value)),
        }
    }

    /// The field's current value, or `None` if its cell is absent.
    pub fn get(&self) -> Option<Value> {
        (self.get)()
    }

    /// Write through to the field's cell, firing its watchers.
    pub fn set(&self, value: Value) {
        (self.set)(value)
    }
}

impl std::fmt::Debug for Accessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessor").finish_non_exhaustive()
    }
}

/// The stored accessor object: key → accessor, in insertion order.
type FieldTable = IndexMap<String, Accessor>;

/// Builder assembling a [`Hadron`] field by field.
///
/// Fields are either existing cells (handle shared) or raw values (wrapped
/// into a brand-new cell first). Re-using a key replaces the earlier field.
pub struct HadronBuilder {
    memory: Memory,
    fields: FieldTable,
}

impl HadronBuilder {
    /// Add a field backed by an existing cell. The group shares the cell's
    /// handle; it does not copy its state.
    pub fn cell<T>(mut self, key: impl Into<String>, cell: &Quark<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.fields
            .insert(key.into(), Accessor::over(&self.memory, cell.handle()));
        self
    }

    /// Add a field holding `value`, wrapped into a brand-new cell.
    pub fn value<T>(self, key: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        let cell = self.memory.quark(value);
        self.cell(key, &cell)
    }

    /// Allocate the accessor table into the memory and return the group.
    pub fn build(self) -> Hadron {
        let fields = Arc::new(self.fields);
        let stored: Value = Arc::<FieldTable>::clone(&fields);
        let handle = self.memory.allocate(stored);
        Hadron { handle, fields }
    }
}

/// A named aggregation of cells behind one handle.
///
/// # Example
///
/// ```rust
/// use quark_core::{Hadron, Memory};
///
/// let memory = Memory::new();
/// let email = memory.quark(String::new());
///
/// let form = Hadron::builder(&memory)
///     .cell("email", &email)
///     .value("attempts", 0i32)
///     .build();
///
/// form.set("email", String::from("a@b.c")).unwrap();
/// assert_eq!(*email.get().unwrap(), "a@b.c");
/// ```
pub struct Hadron {
    handle: Handle,
    fields: Arc<FieldTable>,
}

impl Hadron {
    /// Start building a group in `memory`.
    pub fn builder(memory: &Memory) -> HadronBuilder {
        HadronBuilder {
            memory: memory.clone(),
            fields: FieldTable::new(),
        }
    }

    /// Recover a group from the handle its accessor table was stored under,
    /// e.g. after [`Memory::lookup`]. Returns `None` if the handle is absent
    /// or does not hold an accessor table.
    pub fn from_handle(memory: &Memory, handle: &Handle) -> Option<Self> {
        let fields = memory.dereference(handle)?.downcast::<FieldTable>().ok()?;
        Some(Self {
            handle: handle.clone(),
            fields,
        })
    }

    /// The handle under which this group's accessor table is stored.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The address of the group's accessor table.
    pub fn address(&self) -> Address {
        self.handle.address()
    }

    /// The accessor pair for `key`, if the group has that field.
    pub fn field(&self, key: &str) -> Option<&Accessor> {
        self.fields.get(key)
    }

    /// The current value of field `key`; `None` for unknown fields and for
    /// fields whose cell is absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.field(key)?.get()
    }

    /// Typed read of field `key`. `None` on unknown field, absent cell, or
    /// type mismatch.
    pub fn get_as<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.get(key)?.downcast::<T>().ok()
    }

    /// Write field `key` through to its cell, firing the cell's watchers.
    pub fn set<T>(&self, key: &str, value: T) -> Result<(), GroupError>
    where
        T: Send + Sync + 'static,
    {
        let accessor = self
            .field(key)
            .ok_or_else(|| GroupError::UnknownField(key.to_string()))?;
        accessor.set(Arc::new(value));
        Ok(())
    }

    /// Field keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Clone for Hadron {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            fields: Arc::clone(&self.fields),
        }
    }
}

impl std::fmt::Debug for Hadron {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hadron")
            .field("address", &self.address())
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
