//! Capability handles for callback-driven native backends
//!
//! A native codec calls back into Rust with an opaque `void *` it was given at
//! init time. Instead of a pointer to Rust memory, that value is a [`Handle`]:
//! a slot index plus a generation, resolved through a [`HandleTable`] inside
//! each callback. Removing a handle bumps the slot generation, so a late
//! callback holding a stale handle resolves to nothing rather than to freed or
//! reused state.

use std::sync::Arc;

use parking_lot::Mutex;

const INDEX_BITS: u32 = 16;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: usize = usize::MAX >> INDEX_BITS;

/// Maximum number of live handles per table
pub const MAX_HANDLES: usize = 1 << INDEX_BITS;

/// Opaque identity handed to a native backend as client data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: usize,
}

impl Handle {
    /// Encode as a pointer-sized integer for a C `client_data` argument
    pub fn to_raw(self) -> usize {
        (self.generation << INDEX_BITS) | self.index
    }

    /// Decode a value produced by [`Handle::to_raw`]
    pub fn from_raw(raw: usize) -> Self {
        Self {
            index: raw & INDEX_MASK,
            generation: (raw >> INDEX_BITS) & GENERATION_MASK,
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: usize,
    value: Option<Arc<T>>,
}

/// Table of live handles
///
/// `new` is `const`, so a table can live in a `static` shared by every
/// callback trampoline of one backend type.
#[derive(Debug)]
pub struct HandleTable<T> {
    slots: Mutex<Vec<Slot<T>>>,
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Register `value`, returning `None` once [`MAX_HANDLES`] are live
    pub fn insert(&self, value: T) -> Option<Handle> {
        let mut slots = self.slots.lock();
        let value = Arc::new(value);

        if let Some(index) = slots.iter().position(|s| s.value.is_none()) {
            let slot = &mut slots[index];
            slot.value = Some(value);
            return Some(Handle {
                index,
                generation: slot.generation,
            });
        }

        let index = slots.len();
        if index >= MAX_HANDLES {
            return None;
        }
        slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Some(Handle {
            index,
            generation: 0,
        })
    }

    /// Resolve a handle; stale or unknown handles yield `None`
    pub fn get(&self, handle: Handle) -> Option<Arc<T>> {
        let slots = self.slots.lock();
        slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.clone())
    }

    /// Invalidate a handle, returning the value it referred to
    pub fn remove(&self, handle: Handle) -> Option<Arc<T>> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take();
        if value.is_some() {
            slot.generation = (slot.generation + 1) & GENERATION_MASK;
        }
        value
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
