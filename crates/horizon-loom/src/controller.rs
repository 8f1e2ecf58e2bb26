//! Controllers: the mediators between one model and one view.
//!
//! A controller owns no widgets and no data. It holds a [`ModelRc`] and a
//! view root, routes user edits into the model, keeps sibling controllers
//! bound to the same model in sync, and carries the helper state for
//! change tracking, validation, and refresh (see the `sync`, `changes`,
//! `validation`, and `refresh` modules, which extend this type).
//!
//! Behavior is customized through a [`ControllerDelegate`]: a trait of
//! override points whose defaults implement the standard flows (full
//! copy on refresh, path re-sync on model change, event bubbling).
//! Applications install a delegate with [`Controller::set_delegate`] and
//! override only what they need.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use horizon_loom::{Binding, Loom, MapModel};
//!
//! let loom = Loom::new();
//! let controller = loom.create_controller("person-form");
//!
//! let model = MapModel::new().with("name", "Bob").into_shared();
//! let view = build_person_form();            // application widget tree
//! controller.setup_mvc(model, view)?;        // wire + copy + snapshot
//! ```

use std::any::Any;
use std::sync::Arc;

use static_assertions::assert_impl_all;
use tracing::{debug, trace};

use crate::bag::keys;
use crate::bus::ApplicationEvent;
use crate::component::{ComponentRc, collect_bound_components, for_each_component};
use crate::dispatch::{HandlerArgs, HandlerKind};
use crate::error::{ErrorHandler, LoggingErrorHandler, LoomError, Result};
use crate::logging::targets;
use crate::path::PropertyPath;
use crate::runtime::{ControllerId, Loom};
use crate::sync::CopyDirection;
use crate::validation::ValidationFailure;
use crate::value::{ModelChangeEvent, ModelRc, Value};

/// Override points for controller behavior.
///
/// Every method has a default implementing the standard flow; a delegate
/// only overrides the hooks it cares about. Delegates are shared
/// (`Arc<dyn ControllerDelegate>`) and must not assume exclusive access.
pub trait ControllerDelegate: Send + Sync {
    /// Called when this controller's view should re-render from its
    /// model. Default: a full model-to-view copy.
    fn refresh_view(&self, controller: &Controller, payload: &Value) {
        let _ = payload;
        if let Err(error) = controller.copy_to_view(None) {
            controller.report_error(&error);
        }
    }

    /// Called after a user edit was stored in the model.
    fn view_changed(&self, controller: &Controller, event: &ModelChangeEvent) {
        let _ = (controller, event);
    }

    /// Called when another controller (or the application) wrote to the
    /// model this controller observes. Default: re-sync components bound
    /// under the written path.
    fn model_changed(&self, controller: &Controller, event: &ModelChangeEvent) {
        if let Err(error) = controller.copy_to_view(Some(&event.path)) {
            controller.report_error(&error);
        }
    }

    /// Called for every application event delivered through the bus.
    fn received_application_event(&self, controller: &Controller, event: &ApplicationEvent) {
        let _ = (controller, event);
    }

    /// Called by [`Controller::handle_application_event`]. Default:
    /// bubble to the parent controller; at the root, log and drop.
    fn handle_application_event(&self, controller: &Controller, event: &ApplicationEvent) {
        match controller.parent() {
            Ok(Some(parent)) => {
                if let Err(error) = parent.handle_application_event(event) {
                    controller.report_error(&error);
                }
            }
            Ok(None) => {
                debug!(
                    target: targets::CONTROLLER,
                    event = %event.name,
                    controller = %controller.name(),
                    "application event reached root unhandled"
                );
            }
            Err(error) => controller.report_error(&error),
        }
    }

    /// Called by [`Controller::handle_application_event_down`]. Default:
    /// broadcast recursively to every child controller.
    fn handle_application_event_down(&self, controller: &Controller, event: &ApplicationEvent) {
        match controller.children() {
            Ok(children) => {
                for child in children {
                    if let Err(error) = child.handle_application_event_down(event) {
                        controller.report_error(&error);
                    }
                }
            }
            Err(error) => controller.report_error(&error),
        }
    }

    /// Called when reading a model value failed during a copy or update.
    /// Default: route to the resolved error handler.
    fn model_read_failed(&self, controller: &Controller, error: &LoomError) {
        controller.report_error(error);
    }

    /// Called when writing a model value failed during a copy or update.
    /// Default: route to the resolved error handler.
    fn model_write_failed(&self, controller: &Controller, error: &LoomError) {
        controller.report_error(error);
    }

    /// Called before validation listeners when a component's value was
    /// judged valid.
    fn validation_succeeded(&self, controller: &Controller, component: &ComponentRc) {
        let _ = (controller, component);
    }

    /// Called before validation listeners when a component rejected its
    /// value.
    fn validation_failed(&self, controller: &Controller, failure: &ValidationFailure) {
        let _ = (controller, failure);
    }
}

/// Delegate with every hook at its default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDelegate;

impl ControllerDelegate for DefaultDelegate {}

/// Handle to one controller in a [`Loom`].
///
/// Handles are cheap to clone and safe to keep across the controller's
/// disposal; operations on a disposed controller return
/// [`LoomError::ControllerGone`].
#[derive(Clone)]
pub struct Controller {
    loom: Loom,
    id: ControllerId,
}

assert_impl_all!(Controller: Send, Sync);

impl Controller {
    pub(crate) fn from_parts(loom: Loom, id: ControllerId) -> Self {
        Self { loom, id }
    }

    /// The controller's arena id.
    pub fn id(&self) -> ControllerId {
        self.id
    }

    /// The runtime this controller belongs to.
    pub fn loom(&self) -> &Loom {
        &self.loom
    }

    /// The controller's name; empty once disposed.
    pub fn name(&self) -> String {
        self.loom
            .with_registry_read(|r| r.get(self.id).map(|node| node.name.clone()))
            .unwrap_or_default()
    }

    /// Returns `true` while the controller exists in its runtime.
    pub fn exists(&self) -> bool {
        self.loom.contains(self.id)
    }

    /// Replaces the delegate.
    pub fn set_delegate(&self, delegate: Arc<dyn ControllerDelegate>) -> Result<()> {
        self.loom.with_registry_write(|r| {
            r.get_mut(self.id)?.delegate = delegate;
            Ok(())
        })
    }

    pub(crate) fn delegate(&self) -> Result<Arc<dyn ControllerDelegate>> {
        self.loom
            .with_registry_read(|r| Ok(Arc::clone(&r.get(self.id)?.delegate)))
    }

    /// Disposes the controller (see [`Loom`] lifecycle notes): bus
    /// registrations removed, view back-references cleared, children
    /// re-parented to roots, arena slot freed.
    pub fn dispose(&self) -> Result<()> {
        self.loom.dispose_controller(self.id)
    }

    // ----- tree -------------------------------------------------------

    /// Attaches `child` under this controller, re-parenting it away from
    /// any previous parent.
    pub fn add_child(&self, child: &Controller) -> Result<()> {
        self.loom
            .with_registry_write(|r| r.attach_child(self.id, child.id))
    }

    /// Detaches `child`. Both references are cleared; returns whether the
    /// child was attached here.
    pub fn remove_child(&self, child: &Controller) -> Result<bool> {
        self.loom
            .with_registry_write(|r| r.detach_child(self.id, child.id))
    }

    /// Detaches every child.
    pub fn remove_children(&self) -> Result<()> {
        for child in self.children()? {
            self.remove_child(&child)?;
        }
        Ok(())
    }

    /// The parent controller, if attached.
    pub fn parent(&self) -> Result<Option<Controller>> {
        let parent = self
            .loom
            .with_registry_read(|r| Ok::<_, LoomError>(r.get(self.id)?.parent))?;
        Ok(parent.and_then(|id| self.loom.controller(id)))
    }

    /// The child controllers, in attach order.
    pub fn children(&self) -> Result<Vec<Controller>> {
        let ids = self
            .loom
            .with_registry_read(|r| Ok::<_, LoomError>(r.get(self.id)?.children.clone()))?;
        Ok(ids
            .into_iter()
            .filter_map(|id| self.loom.controller(id))
            .collect())
    }

    /// The root of this controller's tree (self when unattached).
    pub fn root(&self) -> Result<Controller> {
        let mut current = self.clone();
        while let Some(parent) = current.parent()? {
            current = parent;
        }
        Ok(current)
    }

    // ----- wiring -----------------------------------------------------

    /// The bound model, if any.
    pub fn model(&self) -> Result<Option<ModelRc>> {
        self.loom
            .with_registry_read(|r| Ok(r.get(self.id)?.model.clone()))
    }

    /// The bound view root, if any.
    pub fn view(&self) -> Result<Option<ComponentRc>> {
        self.loom
            .with_registry_read(|r| Ok(r.get(self.id)?.view.clone()))
    }

    /// Binds (or unbinds) the model, keeping the view root's
    /// [`keys::MODEL`] back-reference in step.
    pub fn set_model(&self, model: Option<ModelRc>) -> Result<()> {
        let view = self.loom.with_registry_write(|r| {
            let node = r.get_mut(self.id)?;
            node.model = model.clone();
            Ok::<_, LoomError>(node.view.clone())
        })?;
        if let Some(view) = view {
            let mut guard = view.write();
            match &model {
                Some(model) => guard.bag_mut().set(keys::MODEL, Arc::clone(model)),
                None => {
                    guard.bag_mut().remove(keys::MODEL);
                }
            }
        }
        Ok(())
    }

    /// Unbinds the model.
    pub fn clear_model(&self) -> Result<()> {
        self.set_model(None)
    }

    /// Binds (or unbinds) the view root.
    ///
    /// The new root's bag is stamped with this controller's id under
    /// [`keys::CONTROLLER`] (and the model under [`keys::MODEL`]), the
    /// old root's stamps are removed, and every
    /// [`ControllerAware`](crate::component::ControllerAware) component
    /// in the new subtree receives the controller handle.
    pub fn set_view(&self, view: Option<ComponentRc>) -> Result<()> {
        let (old_view, model) = self.loom.with_registry_write(|r| {
            let node = r.get_mut(self.id)?;
            let old = node.view.take();
            node.view = view.clone();
            Ok::<_, LoomError>((old, node.model.clone()))
        })?;
        if let Some(old) = old_view {
            let mut guard = old.write();
            guard.bag_mut().remove(keys::CONTROLLER);
            guard.bag_mut().remove(keys::MODEL);
        }
        if let Some(view) = &view {
            {
                let mut guard = view.write();
                guard.bag_mut().set(keys::CONTROLLER, self.id);
                if let Some(model) = &model {
                    guard.bag_mut().set(keys::MODEL, Arc::clone(model));
                }
            }
            for_each_component(view, &mut |component| {
                let mut guard = component.write();
                if let Some(aware) = guard.as_controller_aware_mut() {
                    aware.attach_controller(self);
                }
            });
        }
        Ok(())
    }

    /// Unbinds the view root.
    pub fn clear_view(&self) -> Result<()> {
        self.set_view(None)
    }

    /// Wires model and view, performs one full model-to-view copy, and
    /// captures the change-tracking baseline.
    ///
    /// A freshly wired form reports no changes.
    pub fn setup_mvc(&self, model: ModelRc, view: ComponentRc) -> Result<()> {
        self.set_model(Some(model))?;
        self.set_view(Some(view))?;
        self.copy_to_view(None)?;
        self.reset_view_changes()?;
        debug!(
            target: targets::CONTROLLER,
            controller = %self.name(),
            "mvc wired"
        );
        Ok(())
    }

    // ----- user edits -------------------------------------------------

    /// Routes a user edit of a single-value component into the model.
    ///
    /// Returns `Ok(false)` without side effects when the value equals the
    /// model's current value (no-op writes never propagate), when the
    /// component is not single-value bound, or when no model is bound.
    /// Reference-sharing components are always treated as changed, since
    /// their value may alias the model's.
    ///
    /// On a successful write the controller, in order: sets the coarse
    /// view-changed flag, notifies sibling controllers observing the same
    /// model, invokes the `view_changed` delegate hook, dispatches the
    /// `Changed` handler for the path (soft), and notifies change
    /// listeners.
    pub fn update_model_and_controller(&self, component: &ComponentRc) -> Result<bool> {
        let (path, value, reference_sharing) = {
            let guard = component.read();
            let Some(path) = guard.binding().and_then(|b| b.path().cloned()) else {
                trace!(
                    target: targets::CONTROLLER,
                    component = guard.name(),
                    "update ignored: component has no bound path"
                );
                return Ok(false);
            };
            let Some(single) = guard.as_single_bound() else {
                trace!(
                    target: targets::CONTROLLER,
                    component = guard.name(),
                    "update ignored: component is not single-value bound"
                );
                return Ok(false);
            };
            (path, single.bound_value(), guard.as_reference_sharing().is_some())
        };
        self.update_value(component, path, value, reference_sharing)
    }

    /// Routes a user edit of one declared field of a multi-field
    /// component into the model.
    pub fn update_model_and_controller_field(
        &self,
        component: &ComponentRc,
        field: &str,
    ) -> Result<bool> {
        let (value, reference_sharing) = {
            let guard = component.read();
            let Some(multi) = guard.as_multi_field() else {
                trace!(
                    target: targets::CONTROLLER,
                    component = guard.name(),
                    "update ignored: component is not multi-field bound"
                );
                return Ok(false);
            };
            (multi.field_value(field), guard.as_reference_sharing().is_some())
        };
        let path = PropertyPath::parse(field)?;
        self.update_value(component, path, value, reference_sharing)
    }

    fn update_value(
        &self,
        component: &ComponentRc,
        path: PropertyPath,
        value: Value,
        reference_sharing: bool,
    ) -> Result<bool> {
        let Some(model) = self.model()? else {
            trace!(
                target: targets::CONTROLLER,
                path = %path,
                "update ignored: no model bound"
            );
            return Ok(false);
        };

        // Guards are bound and dropped before any delegate call so a
        // delegate is free to take the model lock itself.
        let changed = if reference_sharing {
            true
        } else {
            let current = path.read(&*model.read());
            match current {
                Ok(current) => current != value,
                Err(error) => {
                    let error = LoomError::model_copy(
                        path.as_str(),
                        CopyDirection::ViewToModel,
                        Some(value.clone()),
                        error,
                    );
                    self.delegate()?.model_read_failed(self, &error);
                    // Cannot compare; attempt the write anyway.
                    true
                }
            }
        };
        if !changed {
            trace!(target: targets::CONTROLLER, path = %path, "no-op write skipped");
            return Ok(false);
        }

        let written = path.write(&mut *model.write(), value.clone());
        match written {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(error) => {
                let error = LoomError::model_copy(
                    path.as_str(),
                    CopyDirection::ViewToModel,
                    Some(value),
                    error,
                );
                self.delegate()?.model_write_failed(self, &error);
                return Ok(false);
            }
        }

        let event = ModelChangeEvent::user(path.as_str(), value);
        self.propagate_model_change(Some(component), &model, &event)?;
        Ok(true)
    }

    /// Announces a programmatic model write to every controller bound to
    /// this controller's model (including this one).
    ///
    /// Use after mutating the model outside the binding flows so that
    /// observing views re-sync.
    pub fn notify_model_changed(&self, event: &ModelChangeEvent) -> Result<()> {
        let Some(model) = self.model()? else {
            return Ok(());
        };
        self.notify_observers(&model, event, true);
        Ok(())
    }

    fn propagate_model_change(
        &self,
        component: Option<&ComponentRc>,
        model: &ModelRc,
        event: &ModelChangeEvent,
    ) -> Result<()> {
        self.set_view_changed(true)?;

        if model.read().broadcasts_changes() {
            self.notify_observers(model, event, false);
        }

        self.delegate()?.view_changed(self, event);

        let mut args = HandlerArgs::new(event.value.clone());
        if let Some(component) = component {
            args = args.with_component(Arc::clone(component));
        }
        self.dispatch_soft(&event.path, HandlerKind::Changed, &args);

        for listener in self.change_listeners()? {
            listener.view_changed(self, event);
        }
        Ok(())
    }

    /// Delivers `model_changed` to every controller bound to `model`.
    /// `include_self` distinguishes programmatic notification (everyone)
    /// from user edits (siblings only; the editing view is current).
    fn notify_observers(&self, model: &ModelRc, event: &ModelChangeEvent, include_self: bool) {
        let observers: Vec<ControllerId> = self.loom.with_registry_read(|r| {
            r.iter()
                .filter(|(id, node)| {
                    (include_self || *id != self.id)
                        && node
                            .model
                            .as_ref()
                            .is_some_and(|bound| Arc::ptr_eq(bound, model))
                })
                .map(|(id, _)| id)
                .collect()
        });
        for id in observers {
            let Some(observer) = self.loom.controller(id) else {
                continue;
            };
            let Ok(delegate) = observer.delegate() else {
                continue;
            };
            trace!(
                target: targets::CONTROLLER,
                observer = %observer.name(),
                path = %event.path,
                "notifying model observer"
            );
            delegate.model_changed(&observer, event);
        }
    }

    // ----- dynamic dispatch -------------------------------------------

    /// Registers a handler for a path and interaction kind.
    pub fn register_handler<F>(&self, path: &str, kind: HandlerKind, handler: F) -> Result<()>
    where
        F: Fn(&Controller, &HandlerArgs) + Send + Sync + 'static,
    {
        self.loom.with_registry_write(|r| {
            r.get_mut(self.id)?.handlers.register(path, kind, handler);
            Ok(())
        })
    }

    /// Removes a handler registration.
    pub fn unregister_handler(&self, path: &str, kind: HandlerKind) -> Result<bool> {
        self.loom
            .with_registry_write(|r| Ok(r.get_mut(self.id)?.handlers.unregister(path, kind)))
    }

    /// Invokes the handler for a path and kind.
    ///
    /// Returns [`LoomError::HandlerNotFound`] (soft) when no handler is
    /// registered.
    pub fn invoke_handler(&self, path: &str, kind: HandlerKind, args: &HandlerArgs) -> Result<()> {
        let handler = self
            .loom
            .with_registry_read(|r| r.get(self.id)?.handlers.require(path, kind))?;
        handler(self, args);
        Ok(())
    }

    /// Dispatch used by internal flows: a missing handler is logged at
    /// debug level and swallowed; real failures go to the error handler.
    pub(crate) fn dispatch_soft(&self, path: &str, kind: HandlerKind, args: &HandlerArgs) {
        match self.invoke_handler(path, kind, args) {
            Ok(()) => {}
            Err(error) if error.is_soft() => {
                debug!(
                    target: targets::DISPATCH,
                    controller = %self.name(),
                    error = %error,
                    "soft dispatch miss"
                );
            }
            Err(error) => self.report_error(&error),
        }
    }

    // ----- application events -----------------------------------------

    /// Publishes an event on the bus with this controller as source.
    pub fn send_application_event(&self, name: impl Into<String>, value: Value) {
        let event = ApplicationEvent::new(name, value).with_source(self.id);
        self.loom.send_application_event(&event);
    }

    /// Offers an event to this controller; unhandled events bubble to the
    /// parent (delegate default).
    pub fn handle_application_event(&self, event: &ApplicationEvent) -> Result<()> {
        self.delegate()?.handle_application_event(self, event);
        Ok(())
    }

    /// Offers an event to this controller's subtree, top down (delegate
    /// default broadcasts to children).
    pub fn handle_application_event_down(&self, event: &ApplicationEvent) -> Result<()> {
        self.delegate()?.handle_application_event_down(self, event);
        Ok(())
    }

    /// Registers this controller for an event name.
    pub fn register_for_event(&self, name: impl Into<String>) {
        self.loom.event_bus().register(name, self.id);
    }

    /// Removes this controller's registration for one event name.
    pub fn unregister_from_event(&self, name: &str) {
        self.loom.event_bus().unregister(name, self.id);
    }

    /// Removes this controller's registrations for every event name.
    pub fn unregister_from_all_events(&self) {
        self.loom.event_bus().unregister_all(self.id);
    }

    /// Removes bus registrations for this controller and all descendant
    /// controllers.
    pub fn unregister_events_recursively(&self) {
        self.loom.unregister_recursively(self.id);
    }

    // ----- context ----------------------------------------------------

    /// Stores a value in this controller's own context.
    pub fn set_context_value<T: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: T,
    ) -> Result<()> {
        self.loom.with_registry_write(|r| {
            r.get_mut(self.id)?.context.set(key, value);
            Ok(())
        })
    }

    /// Removes a value from this controller's own context.
    pub fn remove_context_value(&self, key: &str) -> Result<bool> {
        self.loom
            .with_registry_write(|r| Ok(r.get_mut(self.id)?.context.remove(key)))
    }

    /// Resolves a context value through the chain: this controller's
    /// context, then each ancestor's, then the application context.
    pub fn context_value<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let from_chain = self.loom.with_registry_read(|r| {
            let mut cursor = Some(self.id);
            while let Some(id) = cursor {
                let Ok(node) = r.get(id) else { break };
                if let Some(value) = node.context.get::<T>(key) {
                    return Some(value);
                }
                cursor = node.parent;
            }
            None
        });
        from_chain.or_else(|| self.loom.context().get::<T>(key))
    }

    // ----- errors -----------------------------------------------------

    /// Routes an error to the handler resolved through the context chain.
    pub fn report_error(&self, error: &LoomError) {
        self.resolved_error_handler().handle_error(self, error);
    }

    /// The error handler this controller's operations use.
    pub fn resolved_error_handler(&self) -> Arc<dyn ErrorHandler> {
        self.context_value::<Arc<dyn ErrorHandler>>(keys::ERROR_HANDLER)
            .map(|handler| Arc::clone(&*handler))
            .unwrap_or_else(|| Arc::new(LoggingErrorHandler))
    }

    // ----- binding verification ---------------------------------------

    /// Checks every bound path under the view against the model's
    /// declared fields, without running a copy.
    ///
    /// Returns the findings instead of failing; an empty vec means every
    /// path is consistent. Models whose `field_names` is empty are not
    /// checked.
    pub fn verify_bindings(&self) -> Result<Vec<LoomError>> {
        let (Some(view), Some(model)) = (self.view()?, self.model()?) else {
            return Ok(Vec::new());
        };
        let mut findings = Vec::new();
        for component in collect_bound_components(&view) {
            let paths: Vec<String> = {
                let guard = component.read();
                let mut paths = Vec::new();
                if let Some(text) = guard.binding().and_then(|b| b.path_text()) {
                    paths.push(text.to_string());
                }
                if let Some(multi) = guard.as_multi_field() {
                    paths.extend(multi.field_names());
                }
                paths
            };
            for text in paths {
                match PropertyPath::parse(&text) {
                    Ok(path) => {
                        if let Some(finding) = verify_path(&model, &path) {
                            findings.push(finding);
                        }
                    }
                    Err(error) => findings.push(error),
                }
            }
        }
        Ok(findings)
    }
}

/// Walks a path against declared field names, descending through
/// non-null nested objects.
fn verify_path(model: &ModelRc, path: &PropertyPath) -> Option<LoomError> {
    let mut current = Arc::clone(model);
    for segment in path.segments() {
        let (declared, value) = {
            let guard = current.read();
            (guard.field_names(), guard.get_field(&segment.name))
        };
        if declared.is_empty() {
            return None;
        }
        if !declared.iter().any(|name| name == &segment.name) {
            return Some(LoomError::invalid_path(
                path.as_str(),
                format!("model declares no field '{}'", segment.name),
            ));
        }
        match value {
            Some(Value::Object(next)) if segment.accessor.is_none() => current = next,
            _ => return None,
        }
    }
    None
}
