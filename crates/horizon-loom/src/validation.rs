//! Validation aggregation across a controller's view.
//!
//! Components own their validation rules; the controller only aggregates.
//! Self-validating components are partitioned into valid and invalid
//! sets, bound components into synchronized and unsynchronized sets
//! (widget value versus model value), and widget-reported failures fan
//! out to the delegate and registered listeners.
//!
//! A component whose model value cannot be read appears in neither sync
//! partition; the failure funnels to the delegate's `model_read_failed`
//! hook instead of silently classifying the component.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::component::{ComponentRc, collect_bound_components};
use crate::controller::Controller;
use crate::error::{LoomError, Result};
use crate::logging::targets;
use crate::value::Value;

/// A component's rejection of its current value.
pub struct ValidationFailure {
    /// The rejecting component.
    pub component: ComponentRc,
    /// The rejected value.
    pub value: Value,
}

impl ValidationFailure {
    pub fn new(component: &ComponentRc, value: Value) -> Self {
        Self {
            component: Arc::clone(component),
            value,
        }
    }
}

impl fmt::Debug for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationFailure")
            .field("component", &self.component.read().name())
            .field("value", &self.value)
            .finish()
    }
}

/// Observes validation outcomes across a controller's view.
///
/// Registered with [`Controller::add_validation_listener`]; both methods
/// default to no-ops.
pub trait ValidationListener: Send + Sync {
    /// A component accepted its current value.
    fn validation_succeeded(&self, controller: &Controller, component: &ComponentRc) {
        let _ = (controller, component);
    }

    /// A component rejected a value.
    fn validation_failed(&self, controller: &Controller, failure: &ValidationFailure) {
        let _ = (controller, failure);
    }
}

impl Controller {
    /// Registers a validation listener.
    pub fn add_validation_listener(&self, listener: Arc<dyn ValidationListener>) -> Result<()> {
        self.loom().with_registry_write(|r| {
            r.get_mut(self.id())?.validation_listeners.push(listener);
            Ok(())
        })
    }

    /// Removes a validation listener by identity. Returns whether it was
    /// registered.
    pub fn remove_validation_listener(
        &self,
        listener: &Arc<dyn ValidationListener>,
    ) -> Result<bool> {
        self.loom().with_registry_write(|r| {
            let listeners = &mut r.get_mut(self.id())?.validation_listeners;
            let before = listeners.len();
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
            Ok(listeners.len() != before)
        })
    }

    pub(crate) fn validation_listeners(&self) -> Result<Vec<Arc<dyn ValidationListener>>> {
        self.loom()
            .with_registry_read(|r| Ok(r.get(self.id())?.validation_listeners.clone()))
    }

    /// Self-validating components currently rejecting their value.
    ///
    /// Components without the capability are never listed.
    pub fn invalid_components(&self) -> Result<Vec<ComponentRc>> {
        Ok(self
            .partition_valid()?
            .into_iter()
            .filter_map(|(component, valid)| (!valid).then_some(component))
            .collect())
    }

    /// Self-validating components currently accepting their value.
    pub fn valid_components(&self) -> Result<Vec<ComponentRc>> {
        Ok(self
            .partition_valid()?
            .into_iter()
            .filter_map(|(component, valid)| valid.then_some(component))
            .collect())
    }

    /// Whether no self-validating component rejects its value.
    pub fn is_view_valid(&self) -> Result<bool> {
        Ok(self
            .partition_valid()?
            .into_iter()
            .all(|(_, valid)| valid))
    }

    fn partition_valid(&self) -> Result<Vec<(ComponentRc, bool)>> {
        let Some(view) = self.view()? else {
            return Ok(Vec::new());
        };
        Ok(collect_bound_components(&view)
            .into_iter()
            .filter_map(|component| {
                let valid = component
                    .read()
                    .as_self_validating()
                    .map(|v| v.is_current_value_valid());
                valid.map(|valid| (component, valid))
            })
            .collect())
    }

    /// Bound components whose widget value differs from the model value
    /// at their path.
    pub fn unsynchronized_components(&self) -> Result<Vec<ComponentRc>> {
        Ok(self.partition_synchronized()?.1)
    }

    /// Bound components whose widget value matches the model value at
    /// their path.
    pub fn synchronized_components(&self) -> Result<Vec<ComponentRc>> {
        Ok(self.partition_synchronized()?.0)
    }

    /// Partitions bound components into (synchronized, unsynchronized).
    /// With no model bound both sets are empty. Read failures exclude the
    /// component from both and funnel to the delegate's
    /// `model_read_failed` hook afterwards.
    fn partition_synchronized(&self) -> Result<(Vec<ComponentRc>, Vec<ComponentRc>)> {
        let Some(view) = self.view()? else {
            return Ok((Vec::new(), Vec::new()));
        };
        let Some(model) = self.model()? else {
            return Ok((Vec::new(), Vec::new()));
        };

        let mut synchronized = Vec::new();
        let mut unsynchronized = Vec::new();
        let mut failures: Vec<(String, LoomError)> = Vec::new();

        for component in collect_bound_components(&view) {
            let verdict = {
                let guard = component.read();
                if let Some(multi) = guard.as_multi_field() {
                    let mut verdict = Some(true);
                    for name in multi.field_names() {
                        match read_model_value(&model, &name) {
                            Ok(model_value) => {
                                if multi.field_value(&name) != model_value {
                                    verdict = verdict.map(|_| false);
                                }
                            }
                            Err(error) => {
                                failures.push((name, error));
                                verdict = None;
                                break;
                            }
                        }
                    }
                    verdict
                } else if let Some(path) = guard.binding().and_then(|b| b.path()) {
                    let read = path.read(&*model.read());
                    match read {
                        Ok(model_value) => {
                            if let Some(shared) = guard.as_reference_sharing() {
                                match shared.bound_value_equals(&model_value) {
                                    Ok(equal) => Some(equal),
                                    Err(error) => {
                                        failures.push((path.as_str().to_string(), error));
                                        None
                                    }
                                }
                            } else {
                                guard
                                    .as_single_bound()
                                    .map(|single| single.bound_value() == model_value)
                            }
                        }
                        Err(error) => {
                            failures.push((path.as_str().to_string(), error));
                            None
                        }
                    }
                } else {
                    None
                }
            };
            match verdict {
                Some(true) => synchronized.push(component),
                Some(false) => unsynchronized.push(component),
                None => {}
            }
        }

        for (path, error) in failures {
            self.read_failed(&path, error);
        }
        Ok((synchronized, unsynchronized))
    }

    /// Fans a widget-reported validation failure out to the delegate,
    /// then to listeners in registration order.
    pub fn notify_validation_failure(&self, component: &ComponentRc, value: Value) -> Result<()> {
        let failure = ValidationFailure::new(component, value);
        debug!(
            target: targets::VALIDATION,
            controller = %self.name(),
            component = %component.read().name(),
            "validation failed"
        );
        self.delegate()?.validation_failed(self, &failure);
        for listener in self.validation_listeners()? {
            listener.validation_failed(self, &failure);
        }
        Ok(())
    }

    /// Fans a validation success out to the delegate, then to listeners
    /// in registration order.
    pub fn notify_validation_success(&self, component: &ComponentRc) -> Result<()> {
        self.delegate()?.validation_succeeded(self, component);
        for listener in self.validation_listeners()? {
            listener.validation_succeeded(self, component);
        }
        Ok(())
    }
}

fn read_model_value(model: &crate::value::ModelRc, path_text: &str) -> Result<Value> {
    let path = crate::path::PropertyPath::parse(path_text)?;
    path.read(&*model.read())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::PropertyBag;
    use crate::component::{Binding, Component, SelfValidating, SingleBound};
    use crate::controller::ControllerDelegate;
    use crate::runtime::Loom;
    use crate::value::MapModel;
    use parking_lot::RwLock;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Field {
        name: String,
        bag: PropertyBag,
        binding: Option<Binding>,
        value: Value,
        valid: Arc<AtomicBool>,
    }

    impl Field {
        fn bound(name: &str, path: &str) -> (ComponentRc, Arc<AtomicBool>) {
            let valid = Arc::new(AtomicBool::new(true));
            let component = Arc::new(RwLock::new(Self {
                name: name.to_string(),
                bag: PropertyBag::new(),
                binding: Some(Binding::new(path).unwrap()),
                value: Value::Null,
                valid: Arc::clone(&valid),
            }));
            (component, valid)
        }
    }

    impl Component for Field {
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
    }

    impl SingleBound for Field {
        fn bound_value(&self) -> Value {
            self.value.clone()
        }

        fn set_bound_value(&mut self, value: Value) {
            self.value = value;
        }
    }

    impl SelfValidating for Field {
        fn is_current_value_valid(&self) -> bool {
            self.valid.load(Ordering::Relaxed)
        }
    }

    struct Panel {
        bag: PropertyBag,
        children: Vec<ComponentRc>,
    }

    impl Panel {
        fn with(children: Vec<ComponentRc>) -> ComponentRc {
            Arc::new(RwLock::new(Self {
                bag: PropertyBag::new(),
                children,
            }))
        }
    }

    impl Component for Panel {
        fn bag(&self) -> &PropertyBag {
            &self.bag
        }

        fn bag_mut(&mut self) -> &mut PropertyBag {
            &mut self.bag
        }

        fn children(&self) -> Vec<ComponentRc> {
            self.children.clone()
        }
    }

    #[test]
    fn partitions_by_component_verdict() {
        let loom = Loom::new();
        let controller = loom.create_controller("form");
        let (name, _) = Field::bound("name", "name");
        let (age, age_valid) = Field::bound("age", "age");
        let view = Panel::with(vec![Arc::clone(&name), Arc::clone(&age)]);
        let model = MapModel::new().with("name", "Bob").with("age", 30i64).into_shared();
        controller.setup_mvc(model, view).unwrap();

        assert!(controller.is_view_valid().unwrap());
        assert_eq!(controller.valid_components().unwrap().len(), 2);

        age_valid.store(false, Ordering::Relaxed);
        assert!(!controller.is_view_valid().unwrap());
        let invalid = controller.invalid_components().unwrap();
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].read().name(), "age");
    }

    #[test]
    fn pending_edit_is_unsynchronized() {
        let loom = Loom::new();
        let controller = loom.create_controller("form");
        let (name, _) = Field::bound("name", "name");
        let model = MapModel::new().with("name", "Bob").into_shared();
        controller.setup_mvc(model, Arc::clone(&name)).unwrap();

        assert_eq!(controller.unsynchronized_components().unwrap().len(), 0);
        assert_eq!(controller.synchronized_components().unwrap().len(), 1);

        name.write()
            .as_single_bound_mut()
            .unwrap()
            .set_bound_value(Value::from("Alice"));
        let pending = controller.unsynchronized_components().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].read().name(), "name");
    }

    #[test]
    fn failure_notification_reaches_delegate_then_listeners() {
        #[derive(Default)]
        struct Recorder {
            order: Arc<Mutex<Vec<&'static str>>>,
        }

        impl ControllerDelegate for Recorder {
            fn validation_failed(&self, _controller: &Controller, _failure: &ValidationFailure) {
                self.order.lock().unwrap().push("delegate");
            }
        }

        struct Listener {
            order: Arc<Mutex<Vec<&'static str>>>,
        }

        impl ValidationListener for Listener {
            fn validation_failed(&self, _controller: &Controller, failure: &ValidationFailure) {
                assert_eq!(failure.value, Value::from("x!"));
                self.order.lock().unwrap().push("listener");
            }
        }

        let loom = Loom::new();
        let controller = loom.create_controller("form");
        let order = Arc::new(Mutex::new(Vec::new()));
        controller
            .set_delegate(Arc::new(Recorder {
                order: Arc::clone(&order),
            }))
            .unwrap();
        controller
            .add_validation_listener(Arc::new(Listener {
                order: Arc::clone(&order),
            }))
            .unwrap();

        let (field, _) = Field::bound("code", "code");
        controller
            .notify_validation_failure(&field, Value::from("x!"))
            .unwrap();
        assert_eq!(order.lock().unwrap().as_slice(), &["delegate", "listener"]);
    }

    #[test]
    fn unreadable_path_is_excluded_from_both_partitions() {
        let loom = Loom::new();
        let controller = loom.create_controller("form");
        let (ghost, _) = Field::bound("ghost", "no_such_field");
        let model = MapModel::new().with("name", "Bob").into_shared();
        controller.set_model(Some(model)).unwrap();
        controller.set_view(Some(ghost)).unwrap();

        assert_eq!(controller.synchronized_components().unwrap().len(), 0);
        assert_eq!(controller.unsynchronized_components().unwrap().len(), 0);
    }

    #[test]
    fn partition_read_failures_reach_delegate() {
        #[derive(Default)]
        struct Capture {
            reads: Mutex<usize>,
        }

        impl ControllerDelegate for Capture {
            fn model_read_failed(&self, _controller: &Controller, _error: &LoomError) {
                *self.reads.lock().unwrap() += 1;
            }
        }

        let loom = Loom::new();
        let controller = loom.create_controller("form");
        let capture = Arc::new(Capture::default());
        controller.set_delegate(capture.clone()).unwrap();

        let (ghost, _) = Field::bound("ghost", "no_such_field");
        let (phantom, _) = Field::bound("phantom", "also_missing");
        let (name, _) = Field::bound("name", "name");
        name.write()
            .as_single_bound_mut()
            .unwrap()
            .set_bound_value(Value::from("Bob"));
        let view = Panel::with(vec![ghost, phantom, Arc::clone(&name)]);
        let model = MapModel::new().with("name", "Bob").into_shared();
        controller.set_model(Some(model)).unwrap();
        controller.set_view(Some(view)).unwrap();

        let synchronized = controller.synchronized_components().unwrap();
        assert_eq!(synchronized.len(), 1);
        assert_eq!(synchronized[0].read().name(), "name");
        assert_eq!(*capture.reads.lock().unwrap(), 2);
    }
}
