//! Per-envelope scratch space shared between pipeline stages.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Typed key/value store created for one inbound envelope.
///
/// Check stages use it to hand computed data (a loaded entity, a parsed
/// token) to later stages and to the handler. It is dropped once the
/// response has been produced.
#[derive(Default)]
pub struct AuxiliaryStore {
    entries: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl AuxiliaryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous value under the same key.
    ///
    /// Returns `true` if a value was replaced.
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T) -> bool
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(key.into(), Box::new(value)).is_some()
    }

    /// Get a value if it exists and has type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Get a mutable reference to a value if it exists and has type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.entries.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Remove and return a value if it exists and has type `T`.
    ///
    /// A value of another type is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.entries.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.entries
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Check if a key is present, regardless of its value type.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for AuxiliaryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuxiliaryStore")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
