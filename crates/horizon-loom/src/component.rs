//! Component contracts and binding records.
//!
//! The framework never depends on concrete widget types. A view is a tree
//! of [`Component`] implementations; what a controller can do with each
//! node is decided by the capability accessors (`as_single_bound`,
//! `as_multi_field`, and friends), each of which defaults to `None`.
//! Widgets opt into exactly the contracts they support.
//!
//! Binding metadata lives in the typed [`Binding`] record rather than the
//! property bag: the path is parsed once at construction, the read-only
//! flag is a plain bool, and the change-tracking snapshot has a dedicated
//! slot. The bag remains available for ad-hoc values and the reserved
//! keys in [`bag::keys`](crate::bag::keys).

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bag::{PropertyBag, keys};
use crate::controller::Controller;
use crate::error::Result;
use crate::path::PropertyPath;
use crate::value::Value;

/// Shared handle to a component.
pub type ComponentRc = Arc<RwLock<dyn Component>>;

/// A node in a view tree.
///
/// Only `bag`/`bag_mut` are required. Everything else defaults to the
/// behavior of an inert container: no binding, no children, visible,
/// no capabilities.
pub trait Component: Any + Send + Sync {
    /// The component's property bag.
    fn bag(&self) -> &PropertyBag;

    /// Mutable access to the property bag.
    fn bag_mut(&mut self) -> &mut PropertyBag;

    /// Component name used in diagnostics and validation errors.
    fn name(&self) -> &str {
        ""
    }

    /// The binding record, when this component is bound.
    fn binding(&self) -> Option<&Binding> {
        None
    }

    /// Mutable access to the binding record.
    fn binding_mut(&mut self) -> Option<&mut Binding> {
        None
    }

    /// Child components, in document order.
    fn children(&self) -> Vec<ComponentRc> {
        Vec::new()
    }

    /// Whether the component is currently visible on screen.
    fn is_showing(&self) -> bool {
        true
    }

    /// Single-value binding capability.
    fn as_single_bound(&self) -> Option<&dyn SingleBound> {
        None
    }

    /// Mutable single-value binding capability.
    fn as_single_bound_mut(&mut self) -> Option<&mut dyn SingleBound> {
        None
    }

    /// Multi-field binding capability.
    fn as_multi_field(&self) -> Option<&dyn MultiFieldBound> {
        None
    }

    /// Mutable multi-field binding capability.
    fn as_multi_field_mut(&mut self) -> Option<&mut dyn MultiFieldBound> {
        None
    }

    /// Reference-sharing capability (deep clone and value equality).
    fn as_reference_sharing(&self) -> Option<&dyn ReferenceSharing> {
        None
    }

    /// Self-validation capability.
    fn as_self_validating(&self) -> Option<&dyn SelfValidating> {
        None
    }

    /// Page-container capability (tab widgets and the like).
    fn as_page_container(&self) -> Option<&dyn PageContainer> {
        None
    }

    /// Controller-awareness capability, used during wiring.
    fn as_controller_aware_mut(&mut self) -> Option<&mut dyn ControllerAware> {
        None
    }
}

/// A component holding exactly one bound value.
pub trait SingleBound {
    /// The component's current value.
    fn bound_value(&self) -> Value;

    /// Replaces the component's current value.
    fn set_bound_value(&mut self, value: Value);
}

/// A component bound to several model fields at once.
///
/// Field names are full model paths; they are declared by the component
/// and copied before any single-value binding in the same view.
pub trait MultiFieldBound {
    /// Declared field paths, in copy order.
    fn field_names(&self) -> Vec<String>;

    /// The component's current value for one declared field.
    fn field_value(&self, name: &str) -> Value;

    /// Replaces the component's value for one declared field.
    fn set_field_value(&mut self, name: &str, value: Value);
}

/// A component whose value shares references with the model.
///
/// Because component and model can alias the same object, change tracking
/// goes through these methods: snapshots hold [`clone_bound_value`] deep
/// copies and comparisons use [`bound_value_equals`] instead of plain
/// equality (which would compare an object with itself).
///
/// [`clone_bound_value`]: ReferenceSharing::clone_bound_value
/// [`bound_value_equals`]: ReferenceSharing::bound_value_equals
pub trait ReferenceSharing {
    /// Produces a deep copy of the current value.
    fn clone_bound_value(&self) -> Result<Value>;

    /// Compares the current value against a previously cloned one.
    fn bound_value_equals(&self, other: &Value) -> Result<bool>;
}

/// A component that can judge its own current value.
pub trait SelfValidating {
    /// Whether the current value passes the component's validation.
    fn is_current_value_valid(&self) -> bool;
}

/// A container showing one child page at a time.
///
/// During refresh traversal, children other than [`current_page`] are
/// treated as hidden, so controllers behind an unselected tab keep their
/// dirty flag until shown.
///
/// [`current_page`]: PageContainer::current_page
pub trait PageContainer {
    /// Index of the currently visible child.
    fn current_page(&self) -> usize;
}

/// A component that routes its user-interaction events to a controller.
///
/// Called once during wiring; implementations typically store the handle
/// and call [`Controller::update_model_and_controller`] from their event
/// listeners.
///
/// [`Controller::update_model_and_controller`]: crate::controller::Controller::update_model_and_controller
pub trait ControllerAware {
    /// Receives the controller that took this component's view.
    fn attach_controller(&mut self, controller: &Controller);
}

/// Snapshot of a component's value(s), captured by `reset_changes`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Captured single value, for single-value and reference-sharing
    /// components.
    pub value: Option<Value>,
    /// Captured `(field, value)` pairs, for multi-field components.
    pub fields: Vec<(String, Value)>,
}

impl Snapshot {
    /// Snapshot of one captured value.
    pub fn of_value(value: Value) -> Self {
        Self {
            value: Some(value),
            fields: Vec::new(),
        }
    }

    /// Snapshot of captured `(field, value)` pairs.
    pub fn of_fields(fields: Vec<(String, Value)>) -> Self {
        Self {
            value: None,
            fields,
        }
    }

    /// Returns `true` when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.fields.is_empty()
    }
}

/// Typed binding metadata for one component.
#[derive(Debug, Clone)]
pub struct Binding {
    path: Option<PropertyPath>,
    read_only: bool,
    snapshot: Option<Snapshot>,
}

impl Binding {
    /// Creates a binding for a model path.
    ///
    /// The path is parsed eagerly, so a malformed path fails here, at
    /// binding time, rather than during a later copy.
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            path: Some(PropertyPath::parse(path)?),
            read_only: false,
            snapshot: None,
        })
    }

    /// Creates a binding with no path of its own.
    ///
    /// Used by multi-field components whose paths come from
    /// [`MultiFieldBound::field_names`] but which still carry the
    /// read-only flag and snapshot slot.
    pub fn unbound() -> Self {
        Self {
            path: None,
            read_only: false,
            snapshot: None,
        }
    }

    /// Builder-style read-only flag.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// The bound path, if any.
    pub fn path(&self) -> Option<&PropertyPath> {
        self.path.as_ref()
    }

    /// The bound path's textual form, if any.
    pub fn path_text(&self) -> Option<&str> {
        self.path.as_ref().map(PropertyPath::as_str)
    }

    /// Whether component-to-model copies skip this component.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Sets the read-only flag.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// The captured snapshot, if one exists.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Stores a snapshot, replacing any previous one.
    pub fn set_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = Some(snapshot);
    }

    /// Removes the captured snapshot.
    pub fn clear_snapshot(&mut self) {
        self.snapshot = None;
    }
}

/// Visits `root` and every descendant in depth-first pre-order.
///
/// A component carrying the [`keys::BOUND_COMPONENTS`] bag override
/// contributes that list in place of its children.
pub fn for_each_component(root: &ComponentRc, visit: &mut dyn FnMut(&ComponentRc)) {
    visit(root);
    let children = {
        let guard = root.read();
        traversal_children(&*guard)
    };
    for child in &children {
        for_each_component(child, visit);
    }
}

/// Collects the bound components under `root`, in document order.
///
/// A component participates when it carries a [`Binding`] record.
pub fn collect_bound_components(root: &ComponentRc) -> Vec<ComponentRc> {
    let mut bound = Vec::new();
    for_each_component(root, &mut |component| {
        if component.read().binding().is_some() {
            bound.push(Arc::clone(component));
        }
    });
    bound
}

fn traversal_children(component: &dyn Component) -> Vec<ComponentRc> {
    if let Some(list) = component.bag().get::<Vec<ComponentRc>>(keys::BOUND_COMPONENTS) {
        (*list).clone()
    } else {
        component.children()
    }
}
