//! Application-wide context values.
//!
//! The last stop of the controller context chain: a lookup that misses
//! every controller context from the starting node up through its
//! ancestors falls through to the [`AppContext`] owned by the runtime.
//! Typical tenants are the default error handler (seeded by
//! [`Loom::new`](crate::runtime::Loom::new)), session data, and services
//! shared by every form.

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bag::PropertyBag;

/// Synchronized process-wide key/value store.
#[derive(Default)]
pub struct AppContext {
    values: RwLock<PropertyBag>,
}

impl AppContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under a key, replacing any existing entry.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.values.write().set(key, value);
    }

    /// Stores an already-shared value under a key.
    pub fn set_arc(&self, key: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        self.values.write().set_arc(key, value);
    }

    /// Retrieves a value by key, downcast to the requested type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.values.read().get::<T>(key)
    }

    /// Removes a key, returning whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.values.write().remove(key)
    }

    /// Returns `true` if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains(key)
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .read()
            .keys()
            .iter()
            .map(|k| k.to_string())
            .collect();
        keys.sort();
        keys
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns `true` when the context holds no entries.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}
