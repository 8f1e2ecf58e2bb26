//! Shared widget stand-ins for integration tests.
//!
//! These implement just enough of the component contracts to drive the
//! binding flows: a single-value editor, a multi-field grid, plain and
//! page containers, and an editor whose value aliases the model.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use horizon_loom::{
    Binding, Component, ComponentRc, Controller, ControllerAware, MapModel, ModelRc,
    MultiFieldBound, PageContainer, PropertyBag, ReferenceSharing, Result, RwLock, SelfValidating,
    SingleBound, Value,
};

static INIT: Once = Once::new();

/// Installs a subscriber once so `RUST_LOG` filtering works in tests.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Single-value editor with an externally controlled validity flag.
pub struct FieldStub {
    name: String,
    bag: PropertyBag,
    binding: Option<Binding>,
    value: Value,
    valid: Arc<AtomicBool>,
    controller: Mutex<Option<Controller>>,
}

/// Creates a single-value editor bound to `path`.
pub fn field(name: &str, path: &str) -> ComponentRc {
    field_with_validity(name, path).0
}

/// Creates a single-value editor plus a handle to flip its validity.
pub fn field_with_validity(name: &str, path: &str) -> (ComponentRc, Arc<AtomicBool>) {
    let valid = Arc::new(AtomicBool::new(true));
    let component = Arc::new(RwLock::new(FieldStub {
        name: name.to_string(),
        bag: PropertyBag::new(),
        binding: Some(Binding::new(path).expect("valid test path")),
        value: Value::Null,
        valid: Arc::clone(&valid),
        controller: Mutex::new(None),
    }));
    (component, valid)
}

impl Component for FieldStub {
    fn bag(&self) -> &PropertyBag {
        &self.bag
    }

    fn bag_mut(&mut self) -> &mut PropertyBag {
        &mut self.bag
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    fn binding_mut(&mut self) -> Option<&mut Binding> {
        self.binding.as_mut()
    }

    fn as_single_bound(&self) -> Option<&dyn SingleBound> {
        Some(self)
    }

    fn as_single_bound_mut(&mut self) -> Option<&mut dyn SingleBound> {
        Some(self)
    }

    fn as_self_validating(&self) -> Option<&dyn SelfValidating> {
        Some(self)
    }

    fn as_controller_aware_mut(&mut self) -> Option<&mut dyn ControllerAware> {
        Some(self)
    }
}

impl SingleBound for FieldStub {
    fn bound_value(&self) -> Value {
        self.value.clone()
    }

    fn set_bound_value(&mut self, value: Value) {
        self.value = value;
    }
}

impl SelfValidating for FieldStub {
    fn is_current_value_valid(&self) -> bool {
        self.valid.load(Ordering::Relaxed)
    }
}

impl ControllerAware for FieldStub {
    fn attach_controller(&mut self, controller: &Controller) {
        *self.controller.lock().unwrap() = Some(controller.clone());
    }
}

/// Writes a value into a single-value editor, as a user edit would.
pub fn set_field(component: &ComponentRc, value: Value) {
    component
        .write()
        .as_single_bound_mut()
        .expect("single-value stub")
        .set_bound_value(value);
}

/// Reads the current value of a single-value editor.
pub fn field_value(component: &ComponentRc) -> Value {
    component
        .read()
        .as_single_bound()
        .expect("single-value stub")
        .bound_value()
}

/// The controller handed to a field through `ControllerAware`, if any.
pub fn attached_controller(component: &ComponentRc) -> Option<Controller> {
    let guard = component.read();
    let any: &dyn std::any::Any = &*guard;
    any.downcast_ref::<FieldStub>()
        .and_then(|field| field.controller.lock().unwrap().clone())
}

/// Grid editing several model fields at once.
pub struct GridStub {
    name: String,
    bag: PropertyBag,
    binding: Option<Binding>,
    fields: HashMap<String, Value>,
    order: Vec<String>,
}

/// Creates a multi-field grid declaring `paths`.
pub fn grid(name: &str, paths: &[&str]) -> ComponentRc {
    Arc::new(RwLock::new(GridStub {
        name: name.to_string(),
        bag: PropertyBag::new(),
        binding: Some(Binding::unbound()),
        fields: paths.iter().map(|p| (p.to_string(), Value::Null)).collect(),
        order: paths.iter().map(|p| p.to_string()).collect(),
    }))
}

impl Component for GridStub {
    fn bag(&self) -> &PropertyBag {
        &self.bag
    }

    fn bag_mut(&mut self) -> &mut PropertyBag {
        &mut self.bag
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    fn binding_mut(&mut self) -> Option<&mut Binding> {
        self.binding.as_mut()
    }

    fn as_multi_field(&self) -> Option<&dyn MultiFieldBound> {
        Some(self)
    }

    fn as_multi_field_mut(&mut self) -> Option<&mut dyn MultiFieldBound> {
        Some(self)
    }
}

impl MultiFieldBound for GridStub {
    fn field_names(&self) -> Vec<String> {
        self.order.clone()
    }

    fn field_value(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    fn set_field_value(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

/// Reads one field of a grid.
pub fn grid_value(component: &ComponentRc, name: &str) -> Value {
    component
        .read()
        .as_multi_field()
        .expect("multi-field stub")
        .field_value(name)
}

/// Writes one field of a grid, as a user edit would.
pub fn set_grid_value(component: &ComponentRc, name: &str, value: Value) {
    component
        .write()
        .as_multi_field_mut()
        .expect("multi-field stub")
        .set_field_value(name, value);
}

/// Plain container with an externally controlled showing flag.
pub struct PanelStub {
    name: String,
    bag: PropertyBag,
    children: Vec<ComponentRc>,
    showing: Arc<AtomicBool>,
}

/// Creates a visible container.
pub fn panel(name: &str, children: Vec<ComponentRc>) -> ComponentRc {
    panel_with_showing(name, children).0
}

/// Creates a container plus a handle to toggle its visibility.
pub fn panel_with_showing(
    name: &str,
    children: Vec<ComponentRc>,
) -> (ComponentRc, Arc<AtomicBool>) {
    let showing = Arc::new(AtomicBool::new(true));
    let component = Arc::new(RwLock::new(PanelStub {
        name: name.to_string(),
        bag: PropertyBag::new(),
        children,
        showing: Arc::clone(&showing),
    }));
    (component, showing)
}

impl Component for PanelStub {
    fn bag(&self) -> &PropertyBag {
        &self.bag
    }

    fn bag_mut(&mut self) -> &mut PropertyBag {
        &mut self.bag
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Vec<ComponentRc> {
        self.children.clone()
    }

    fn is_showing(&self) -> bool {
        self.showing.load(Ordering::Relaxed)
    }
}

/// Page container showing one child at a time.
pub struct TabsStub {
    name: String,
    bag: PropertyBag,
    children: Vec<ComponentRc>,
    current: Arc<AtomicUsize>,
}

/// Creates a page container plus a handle to switch pages.
pub fn tabs(name: &str, children: Vec<ComponentRc>, current: usize) -> (ComponentRc, Arc<AtomicUsize>) {
    let current = Arc::new(AtomicUsize::new(current));
    let component = Arc::new(RwLock::new(TabsStub {
        name: name.to_string(),
        bag: PropertyBag::new(),
        children,
        current: Arc::clone(&current),
    }));
    (component, current)
}

impl Component for TabsStub {
    fn bag(&self) -> &PropertyBag {
        &self.bag
    }

    fn bag_mut(&mut self) -> &mut PropertyBag {
        &mut self.bag
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Vec<ComponentRc> {
        self.children.clone()
    }

    fn as_page_container(&self) -> Option<&dyn PageContainer> {
        Some(self)
    }
}

impl PageContainer for TabsStub {
    fn current_page(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

/// Editor whose value is a shared reference into the model.
pub struct SharedRefStub {
    name: String,
    bag: PropertyBag,
    binding: Option<Binding>,
    model: Option<ModelRc>,
}

/// Creates a reference-sharing editor bound to `path`.
pub fn shared_ref(name: &str, path: &str) -> ComponentRc {
    Arc::new(RwLock::new(SharedRefStub {
        name: name.to_string(),
        bag: PropertyBag::new(),
        binding: Some(Binding::new(path).expect("valid test path")),
        model: None,
    }))
}

impl Component for SharedRefStub {
    fn bag(&self) -> &PropertyBag {
        &self.bag
    }

    fn bag_mut(&mut self) -> &mut PropertyBag {
        &mut self.bag
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    fn binding_mut(&mut self) -> Option<&mut Binding> {
        self.binding.as_mut()
    }

    fn as_single_bound(&self) -> Option<&dyn SingleBound> {
        Some(self)
    }

    fn as_single_bound_mut(&mut self) -> Option<&mut dyn SingleBound> {
        Some(self)
    }

    fn as_reference_sharing(&self) -> Option<&dyn ReferenceSharing> {
        Some(self)
    }
}

impl SingleBound for SharedRefStub {
    fn bound_value(&self) -> Value {
        self.model
            .as_ref()
            .map(|m| Value::Object(Arc::clone(m)))
            .unwrap_or_default()
    }

    fn set_bound_value(&mut self, value: Value) {
        self.model = match value {
            Value::Object(model) => Some(model),
            _ => None,
        };
    }
}

impl ReferenceSharing for SharedRefStub {
    fn clone_bound_value(&self) -> Result<Value> {
        match &self.model {
            None => Ok(Value::Null),
            Some(model) => {
                let guard = model.read();
                let mut copy = MapModel::new();
                for name in guard.field_names() {
                    copy.insert(&name, guard.get_field(&name).unwrap_or_default());
                }
                Ok(Value::Object(copy.into_shared()))
            }
        }
    }

    fn bound_value_equals(&self, other: &Value) -> Result<bool> {
        match (&self.model, other) {
            (None, Value::Null) => Ok(true),
            (Some(mine), Value::Object(theirs)) => {
                let mine = mine.read();
                let theirs = theirs.read();
                let mut names = mine.field_names();
                let mut other_names = theirs.field_names();
                names.sort();
                other_names.sort();
                if names != other_names {
                    return Ok(false);
                }
                Ok(names
                    .iter()
                    .all(|name| mine.get_field(name) == theirs.get_field(name)))
            }
            _ => Ok(false),
        }
    }
}
