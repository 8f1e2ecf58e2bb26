//! Dynamic values and the model reflection surface.
//!
//! Every binding edge in the framework moves a [`Value`]: a type-erased
//! container covering the primitives a form deals in, plus lists, maps,
//! nested model objects, and opaque application data. Models expose their
//! fields through the [`Model`] trait, which the path accessor resolves
//! against at runtime.
//!
//! # Example
//!
//! ```
//! use horizon_loom::{MapModel, Model, Value};
//!
//! let mut person = MapModel::new().with("name", "Bob").with("age", 42);
//! assert_eq!(person.get_field("name"), Some(Value::from("Bob")));
//!
//! person.set_field("age", Value::from(43));
//! assert_eq!(person.get_field("age"), Some(Value::from(43)));
//!
//! // Unknown fields are rejected, not silently created.
//! assert!(!person.set_field("height", Value::from(180)));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Shared handle to a model instance.
///
/// Controllers hold models through this alias; two controllers bound to
/// clones of the same `ModelRc` observe the same underlying data.
pub type ModelRc = Arc<RwLock<dyn Model>>;

/// Type-erased container for bound data.
///
/// `Value` carries everything that flows between models and components:
/// primitives, lists and maps for indexed and keyed path segments, nested
/// [`Model`] objects for dotted traversal, and `Custom` for opaque
/// application types.
///
/// Equality is structural for primitives and containers, and identity
/// (`Arc::ptr_eq`) for `Object` and `Custom`. Cloning is cheap and shallow
/// for `Object` and `Custom`; components holding such values should
/// implement the reference-sharing capability so snapshots hold deep
/// copies instead of aliases.
#[derive(Default)]
pub enum Value {
    /// Absent or null value.
    #[default]
    Null,
    /// Boolean data.
    Bool(bool),
    /// Integer data.
    Int(i64),
    /// Floating point data.
    Float(f64),
    /// String data.
    String(String),
    /// Ordered list, addressable by `[n]` path segments.
    List(Vec<Value>),
    /// Keyed map, addressable by `("key")` path segments.
    Map(HashMap<String, Value>),
    /// Nested model object, traversable by dotted path segments.
    Object(ModelRc),
    /// Custom data (type-erased, shared).
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Creates custom data from any type.
    pub fn custom<T: Any + Send + Sync + 'static>(value: T) -> Self {
        Value::Custom(Arc::new(value))
    }

    /// Wraps a model handle as a nested object value.
    pub fn object(model: ModelRc) -> Self {
        Value::Object(model)
    }

    /// Returns `true` if this is `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to get the data as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get the data as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to get the data as a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to get the data as a string slice.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Attempts to get the data as an owned string.
    pub fn into_string(self) -> Option<String> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to get the data as a list slice.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Attempts to get the data as a keyed map.
    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Attempts to get the data as a nested model handle.
    pub fn as_object(&self) -> Option<&ModelRc> {
        match self {
            Value::Object(model) => Some(model),
            _ => None,
        }
    }

    /// Attempts to downcast custom data to the specified type.
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Custom(data) => data.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Short name of the contained kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Custom(_) => "custom",
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(n) => Value::Int(*n),
            Value::Float(n) => Value::Float(*n),
            Value::String(s) => Value::String(s.clone()),
            Value::List(items) => Value::List(items.clone()),
            Value::Map(entries) => Value::Map(entries.clone()),
            // Shared handles: the clone aliases the original.
            Value::Object(model) => Value::Object(Arc::clone(model)),
            Value::Custom(data) => Value::Custom(Arc::clone(data)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Custom(a), Value::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Value::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            // Contents are not Debug; render the handle opaquely.
            Value::Object(_) => write!(f, "Object(..)"),
            Value::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(entries: HashMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(value) => value.into(),
            None => Value::Null,
        }
    }
}

/// Field-level reflection surface for bindable models.
///
/// The path accessor resolves dotted paths by calling `get_field` and
/// `set_field` segment by segment; nested objects are reached through
/// [`Value::Object`]. There is no derive support: domain models implement
/// the three required methods by hand, or applications use [`MapModel`]
/// for fully dynamic data.
pub trait Model: Send + Sync {
    /// Reads a field by name. `None` means the model has no such field.
    fn get_field(&self, name: &str) -> Option<Value>;

    /// Writes a field by name. Returns `false` when the model has no such
    /// field or rejects the value.
    fn set_field(&mut self, name: &str, value: Value) -> bool;

    /// Names of the declared fields.
    ///
    /// May return an empty vec for models that cannot enumerate their
    /// fields; ahead-of-time binding verification skips such models.
    fn field_names(&self) -> Vec<String>;

    /// Whether user-originated writes through a controller should be
    /// re-broadcast to sibling controllers bound to the same instance.
    fn broadcasts_changes(&self) -> bool {
        false
    }
}

/// Describes one write into a model.
///
/// Produced by [`Controller::update_model_and_controller`] for user edits
/// and by [`Controller::notify_model_changed`] for programmatic writes;
/// consumed by the `model_changed` delegate hook of observing controllers
/// and by change listeners.
///
/// [`Controller::update_model_and_controller`]: crate::controller::Controller::update_model_and_controller
/// [`Controller::notify_model_changed`]: crate::controller::Controller::notify_model_changed
#[derive(Debug, Clone, PartialEq)]
pub struct ModelChangeEvent {
    /// Path of the field that was written.
    pub path: String,
    /// The value that was stored.
    pub value: Value,
    /// Whether the write originated from direct user interaction.
    pub user_originated: bool,
}

impl ModelChangeEvent {
    /// Creates an event for a user-originated edit.
    pub fn user(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
            user_originated: true,
        }
    }

    /// Creates an event for a programmatic write.
    pub fn programmatic(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
            user_originated: false,
        }
    }
}

/// Generic map-backed model.
///
/// Fields must be declared up front (via [`MapModel::insert`] or
/// [`MapModel::with`]); `set_field` rejects unknown names so that typos
/// surface as property access errors instead of silently growing the map.
/// Broadcasts change notifications by default.
#[derive(Debug, Default, Clone)]
pub struct MapModel {
    fields: HashMap<String, Value>,
}

impl MapModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field, replacing any existing value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style field declaration.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Wraps the model in a shared handle.
    pub fn into_shared(self) -> Arc<RwLock<MapModel>> {
        Arc::new(RwLock::new(self))
    }
}

impl Model for MapModel {
    fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        match self.fields.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.keys().cloned().collect();
        names.sort();
        names
    }

    fn broadcasts_changes(&self) -> bool {
        true
    }
}
