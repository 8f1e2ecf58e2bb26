//! Dynamic handler dispatch.
//!
//! The original framework located per-field reaction methods by name at
//! runtime. Here the controller owns a [`HandlerTable`]: applications
//! register closures up front under a derived handler name, and the
//! framework dispatches by table lookup. A missing handler is the soft
//! [`LoomError::HandlerNotFound`], which internal dispatch sites log at
//! debug level and otherwise ignore.
//!
//! Handler names are derived from the bound path and a [`HandlerKind`]
//! suffix: `billing.zip_code` + `Changed` becomes `billingZipCodeChanged`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::component::ComponentRc;
use crate::controller::Controller;
use crate::error::{LoomError, Result};
use crate::value::Value;

/// Kinds of user interaction a handler can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// A bound value changed.
    Changed,
    /// A button-like component was pressed.
    Pressed,
    /// A window or page was opened.
    Opened,
    /// A window or page is closing.
    Closing,
    /// A selection changed.
    SelectionChanged,
    /// A tree node is about to expand.
    WillExpand,
}

impl HandlerKind {
    /// The method-name suffix for this kind.
    pub fn suffix(&self) -> &'static str {
        match self {
            HandlerKind::Changed => "Changed",
            HandlerKind::Pressed => "Pressed",
            HandlerKind::Opened => "Opened",
            HandlerKind::Closing => "Closing",
            HandlerKind::SelectionChanged => "SelectionChanged",
            HandlerKind::WillExpand => "WillExpand",
        }
    }
}

/// Arguments handed to a dispatched handler.
#[derive(Clone)]
pub struct HandlerArgs {
    /// The value involved in the interaction, `Value::Null` when none.
    pub value: Value,
    /// The component the interaction came from, when known.
    pub component: Option<ComponentRc>,
}

impl HandlerArgs {
    /// Creates arguments carrying a value.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            component: None,
        }
    }

    /// Builder-style component attachment.
    pub fn with_component(mut self, component: ComponentRc) -> Self {
        self.component = Some(component);
        self
    }
}

/// A registered handler closure.
pub type Handler = Arc<dyn Fn(&Controller, &HandlerArgs) + Send + Sync>;

/// Normalizes a path to a method-name-safe identifier.
///
/// Alphanumeric runs are kept; everything else starts a camel-case join.
/// The first run keeps its original casing.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let tokens = path
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty());
    for (position, token) in tokens.enumerate() {
        if position == 0 {
            out.push_str(token);
        } else {
            push_capitalized(&mut out, token);
        }
    }
    out
}

/// Derives the handler name for a path and kind.
pub fn handler_name(path: &str, kind: HandlerKind) -> String {
    let mut name = normalize_path(path);
    name.push_str(kind.suffix());
    name
}

fn push_capitalized(out: &mut String, token: &str) {
    let mut chars = token.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
}

/// Per-controller registry of dispatchable handlers.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl HandlerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under the name derived from `path` and `kind`,
    /// replacing any previous registration.
    pub fn register<F>(&mut self, path: &str, kind: HandlerKind, handler: F)
    where
        F: Fn(&Controller, &HandlerArgs) + Send + Sync + 'static,
    {
        self.register_named(handler_name(path, kind), handler);
    }

    /// Registers a handler under an explicit name.
    pub fn register_named<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Controller, &HandlerArgs) + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    /// Removes the handler for `path` and `kind`, returning whether one
    /// was registered.
    pub fn unregister(&mut self, path: &str, kind: HandlerKind) -> bool {
        self.handlers.remove(&handler_name(path, kind)).is_some()
    }

    /// Looks up the handler for `path` and `kind`.
    pub fn lookup(&self, path: &str, kind: HandlerKind) -> Option<Handler> {
        self.lookup_named(&handler_name(path, kind))
    }

    /// Looks up a handler by exact name.
    pub fn lookup_named(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }

    /// Looks up a handler, or reports the miss as a soft error.
    pub fn require(&self, path: &str, kind: HandlerKind) -> Result<Handler> {
        let name = handler_name(path, kind);
        self.lookup_named(&name)
            .ok_or(LoomError::HandlerNotFound { name })
    }

    /// Registered handler names, unordered.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(|name| name.as_str()).collect()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_camel_joins_on_specials() {
        assert_eq!(normalize_path("name"), "name");
        assert_eq!(normalize_path("customer.name"), "customerName");
        assert_eq!(normalize_path("billing.zip_code"), "billingZipCode");
        assert_eq!(normalize_path("orders[2].status"), "orders2Status");
        assert_eq!(normalize_path("alreadyCamel"), "alreadyCamel");
    }

    #[test]
    fn handler_names_append_suffix() {
        assert_eq!(handler_name("name", HandlerKind::Changed), "nameChanged");
        assert_eq!(handler_name("save", HandlerKind::Pressed), "savePressed");
        assert_eq!(
            handler_name("orders", HandlerKind::SelectionChanged),
            "ordersSelectionChanged"
        );
    }

    #[test]
    fn register_lookup_unregister() {
        let mut table = HandlerTable::new();
        assert!(table.is_empty());
        table.register("name", HandlerKind::Changed, |_, _| {});
        assert_eq!(table.len(), 1);
        assert!(table.lookup("name", HandlerKind::Changed).is_some());
        assert!(table.lookup("name", HandlerKind::Pressed).is_none());

        assert!(table.unregister("name", HandlerKind::Changed));
        assert!(!table.unregister("name", HandlerKind::Changed));
        assert!(table.is_empty());
    }

    #[test]
    fn require_reports_soft_miss() {
        let table = HandlerTable::new();
        let err = table.require("name", HandlerKind::Changed).err().unwrap();
        assert!(err.is_soft());
        assert_eq!(err.to_string(), "no handler registered for 'nameChanged'");
    }
}
