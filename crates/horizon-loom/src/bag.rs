//! Property bags: the generic string-to-object map on every component
//! and every controller.
//!
//! Bags hold ad-hoc context values next to the handful of reserved keys
//! the framework itself reads (see [`keys`]). Binding metadata does not
//! live here: the path, read-only flag, and snapshot slot are carried by
//! the strongly-typed [`Binding`](crate::component::Binding) record.
//!
//! Values are stored as `Arc<dyn Any + Send + Sync>` so they can be handed
//! out from behind a lock without borrowing the bag.
//!
//! # Example
//!
//! ```
//! use horizon_loom::PropertyBag;
//!
//! let mut bag = PropertyBag::new();
//! bag.set("row.height", 24i32);
//! assert_eq!(bag.get::<i32>("row.height").as_deref(), Some(&24));
//! assert!(bag.get::<String>("row.height").is_none());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved bag keys read by the framework.
pub mod keys {
    /// `ControllerId` stamped on a view root when a controller takes the
    /// view; removed again when the view is cleared.
    pub const CONTROLLER: &str = "loom.controller";

    /// `ModelRc` back-reference stamped on a view root alongside
    /// [`CONTROLLER`], kept in step with the controller's model.
    pub const MODEL: &str = "loom.model";

    /// `Vec<ComponentRc>` override: when present on a component, bound
    /// component traversal uses this list instead of the component's
    /// children.
    pub const BOUND_COMPONENTS: &str = "loom.boundComponents";

    /// `bool` flag marking a component as participating in the
    /// application's unsaved-changes confirmation flow. The flow itself
    /// is an application concern; the framework only reserves the key.
    pub const CHECK_UNSAVED_CHANGES: &str = "loom.checkUnsavedChanges";

    /// `Arc<dyn ErrorHandler>` context slot consulted when resolving the
    /// error handler through the controller context chain.
    pub const ERROR_HANDLER: &str = "loom.errorHandler";
}

/// String-keyed map of type-erased shared values.
#[derive(Default, Clone)]
pub struct PropertyBag {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl PropertyBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under a key, replacing any existing entry.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Arc::new(value));
    }

    /// Stores an already-shared value under a key.
    pub fn set_arc(&mut self, key: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        self.values.insert(key.into(), value);
    }

    /// Retrieves a value by key, downcast to the requested type.
    ///
    /// Returns `None` when the key is absent or holds a different type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.values
            .get(key)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Borrows a value by key without cloning the handle.
    pub fn get_ref<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    /// Convenience accessor for boolean flags.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_ref::<bool>(key).copied()
    }

    /// Removes a key, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Returns `true` if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All keys currently in the bag.
    pub fn keys(&self) -> Vec<&str> {
        self.values.keys().map(|k| k.as_str()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the bag holds no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copies every entry of `other` into this bag, overwriting on
    /// key collision. Values are shared, not deep-copied.
    pub fn merge(&mut self, other: &PropertyBag) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), Arc::clone(value));
        }
    }
}

impl std::fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys = self.keys();
        keys.sort_unstable();
        f.debug_struct("PropertyBag").field("keys", &keys).finish()
    }
}
