//! Opaque handles for values owned on this side of a foreign boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Identifier of a value stored in a [`HandleTable`]. `0` is never issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Handle(u64);

impl Handle {
    pub const NULL: Handle = Handle(0);

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleError {
    #[error("unknown or released handle {0}")]
    Stale(Handle),
}

struct Slots<T> {
    next: u64,
    values: BTreeMap<u64, T>,
}

/// Thread-safe table mapping handles to owned values.
///
/// Handles grow monotonically and are never reused, so a released handle
/// stays invalid for the life of the table.
pub struct HandleTable<T> {
    slots: Mutex<Slots<T>>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                next: 1,
                values: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, value: T) -> Handle {
        let mut slots = self.lock();
        let raw = slots.next;
        slots.next += 1;
        slots.values.insert(raw, value);
        Handle(raw)
    }

    /// Run `f` on the value behind `handle` while the table is locked.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&T) -> R) -> Result<R, HandleError> {
        let slots = self.lock();
        slots
            .values
            .get(&handle.0)
            .map(f)
            .ok_or(HandleError::Stale(handle))
    }

    pub fn with_mut<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, HandleError> {
        let mut slots = self.lock();
        slots
            .values
            .get_mut(&handle.0)
            .map(f)
            .ok_or(HandleError::Stale(handle))
    }

    pub fn remove(&self, handle: Handle) -> Result<T, HandleError> {
        self.lock()
            .values
            .remove(&handle.0)
            .ok_or(HandleError::Stale(handle))
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.lock().values.contains_key(&handle.0)
    }

    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_handles_are_not_reused() {
        let table = HandleTable::new();
        let a = table.insert(String::from("a"));
        assert_ne!(a, Handle::NULL);
        assert_eq!(table.remove(a), Ok(String::from("a")));
        let b = table.insert(String::from("b"));
        assert_ne!(a, b);
        assert_eq!(table.with(a, |s| s.len()), Err(HandleError::Stale(a)));
        assert!(table.contains(b));
    }

    #[test]
    fn with_mut_updates_in_place() {
        let table = HandleTable::new();
        let h = table.insert(vec![1, 2]);
        table.with_mut(h, |v| v.push(3)).expect("live handle");
        assert_eq!(table.with(h, |v| v.clone()), Ok(vec![1, 2, 3]));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn null_handle_is_stale() {
        let table: HandleTable<u8> = HandleTable::new();
        assert!(table.is_empty());
        assert_eq!(table.remove(Handle::NULL), Err(HandleError::Stale(Handle::NULL)));
    }
}
