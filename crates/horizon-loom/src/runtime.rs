//! The binding runtime: controller arena, event bus, application context.
//!
//! A [`Loom`] is constructed explicitly by the application and handed to
//! whatever needs it; there is no global instance. Controllers live in an
//! arena keyed by [`ControllerId`], so parent/child links, bus
//! registrations, and application code all refer to controllers through
//! copyable ids instead of owning pointers. A [`Controller`] handle is an
//! id plus a runtime reference; handles are cheap to clone and outliving
//! the controller only means operations start returning
//! [`LoomError::ControllerGone`].
//!
//! # Example
//!
//! ```
//! use horizon_loom::Loom;
//!
//! let loom = Loom::new();
//! let orders = loom.create_controller("orders");
//! let detail = loom.create_controller("order-detail");
//! orders.add_child(&detail).unwrap();
//!
//! assert_eq!(detail.parent().unwrap().map(|p| p.id()), Some(orders.id()));
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use slotmap::{SlotMap, new_key_type};
use static_assertions::assert_impl_all;
use tracing::{debug, trace};

use crate::bag::{PropertyBag, keys};
use crate::bus::{ApplicationEvent, EventBus};
use crate::changes::ChangeListener;
use crate::component::ComponentRc;
use crate::context::AppContext;
use crate::controller::{Controller, ControllerDelegate, DefaultDelegate};
use crate::dispatch::HandlerTable;
use crate::error::{ErrorHandler, LoggingErrorHandler, LoomError, Result};
use crate::logging::targets;
use crate::validation::ValidationListener;
use crate::value::{ModelRc, Value};

new_key_type! {
    /// Stable identifier of a controller in the arena.
    pub struct ControllerId;
}

/// Configuration for creating a [`Loom`].
#[derive(Debug, Clone)]
pub struct LoomConfig {
    /// Name used in diagnostics (tree dumps, log events).
    pub name: String,
    /// Whether events sent with no registered listener are logged.
    pub log_unhandled_events: bool,
}

impl Default for LoomConfig {
    fn default() -> Self {
        Self {
            name: "loom".to_string(),
            log_unhandled_events: true,
        }
    }
}

impl LoomConfig {
    /// Create a new configuration with the given diagnostics name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Internal data stored in the arena for each controller.
pub(crate) struct ControllerNode {
    /// Human-readable name for diagnostics and lookup.
    pub(crate) name: String,
    /// The bound model, if any.
    pub(crate) model: Option<ModelRc>,
    /// The root of the bound view, if any.
    pub(crate) view: Option<ComponentRc>,
    /// Parent controller (if any).
    pub(crate) parent: Option<ControllerId>,
    /// Child controllers, in attach order.
    pub(crate) children: Vec<ControllerId>,
    /// Override points for this controller.
    pub(crate) delegate: Arc<dyn ControllerDelegate>,
    /// Registered dynamic-dispatch handlers.
    pub(crate) handlers: HandlerTable,
    /// The controller's own context bag.
    pub(crate) context: PropertyBag,
    /// Coarse view-changed flag.
    pub(crate) view_changed: bool,
    /// Dirty flag consumed by view refresh.
    pub(crate) dirty: bool,
    /// Payload delivered with the next refresh.
    pub(crate) refresh_payload: Value,
    /// Change listeners, in registration order.
    pub(crate) change_listeners: Vec<Arc<dyn ChangeListener>>,
    /// Validation listeners, in registration order.
    pub(crate) validation_listeners: Vec<Arc<dyn ValidationListener>>,
}

impl ControllerNode {
    fn new(name: String) -> Self {
        Self {
            name,
            model: None,
            view: None,
            parent: None,
            children: Vec::new(),
            delegate: Arc::new(DefaultDelegate),
            handlers: HandlerTable::new(),
            context: PropertyBag::new(),
            view_changed: false,
            dirty: false,
            refresh_payload: Value::Null,
            change_listeners: Vec::new(),
            validation_listeners: Vec::new(),
        }
    }
}

/// Arena storage for controller nodes.
pub(crate) struct ControllerRegistry {
    controllers: SlotMap<ControllerId, ControllerNode>,
}

impl ControllerRegistry {
    fn new() -> Self {
        Self {
            controllers: SlotMap::with_key(),
        }
    }

    fn create(&mut self, name: String) -> ControllerId {
        self.controllers.insert(ControllerNode::new(name))
    }

    fn remove(&mut self, id: ControllerId) -> Option<ControllerNode> {
        self.controllers.remove(id)
    }

    pub(crate) fn contains(&self, id: ControllerId) -> bool {
        self.controllers.contains_key(id)
    }

    pub(crate) fn get(&self, id: ControllerId) -> Result<&ControllerNode> {
        self.controllers.get(id).ok_or(LoomError::ControllerGone)
    }

    pub(crate) fn get_mut(&mut self, id: ControllerId) -> Result<&mut ControllerNode> {
        self.controllers.get_mut(id).ok_or(LoomError::ControllerGone)
    }

    /// Attach `child` under `parent`, re-parenting if already attached
    /// elsewhere. Rejects attachments that would create a cycle.
    pub(crate) fn attach_child(&mut self, parent: ControllerId, child: ControllerId) -> Result<()> {
        if parent == child {
            return Err(LoomError::CircularParentage);
        }
        let mut cursor = self.get(parent)?.parent;
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(LoomError::CircularParentage);
            }
            cursor = self.get(ancestor)?.parent;
        }

        let previous = self.get(child)?.parent;
        if previous == Some(parent) {
            return Ok(());
        }
        if let Some(previous) = previous
            && let Ok(node) = self.get_mut(previous)
        {
            node.children.retain(|c| *c != child);
        }
        self.get_mut(parent)?.children.push(child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach `child` from `parent`. Returns whether it was attached.
    pub(crate) fn detach_child(&mut self, parent: ControllerId, child: ControllerId) -> Result<bool> {
        let node = self.get_mut(parent)?;
        let before = node.children.len();
        node.children.retain(|c| *c != child);
        let was_attached = node.children.len() != before;
        if was_attached && let Ok(child_node) = self.get_mut(child) {
            child_node.parent = None;
        }
        Ok(was_attached)
    }

    /// The subtree rooted at `id`, in depth-first pre-order.
    pub(crate) fn collect_subtree(&self, id: ControllerId) -> Vec<ControllerId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Ok(node) = self.get(current) else { continue };
            out.push(current);
            for child in node.children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ControllerId, &ControllerNode)> {
        self.controllers.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.controllers.len()
    }
}

struct LoomShared {
    registry: RwLock<ControllerRegistry>,
    bus: EventBus,
    context: AppContext,
    config: LoomConfig,
}

/// Handle to a binding runtime.
///
/// Cloning is cheap; all clones refer to the same arena, bus, and
/// application context.
#[derive(Clone)]
pub struct Loom {
    shared: Arc<LoomShared>,
}

assert_impl_all!(Loom: Send, Sync);

impl Default for Loom {
    fn default() -> Self {
        Self::new()
    }
}

impl Loom {
    /// Creates a runtime with default configuration.
    ///
    /// The application context is seeded with a [`LoggingErrorHandler`]
    /// under [`keys::ERROR_HANDLER`], so error-handler resolution always
    /// terminates.
    pub fn new() -> Self {
        Self::with_config(LoomConfig::default())
    }

    /// Creates a runtime with the given configuration.
    pub fn with_config(config: LoomConfig) -> Self {
        let loom = Self {
            shared: Arc::new(LoomShared {
                registry: RwLock::new(ControllerRegistry::new()),
                bus: EventBus::new(),
                context: AppContext::new(),
                config,
            }),
        };
        let default_handler: Arc<dyn ErrorHandler> = Arc::new(LoggingErrorHandler);
        loom.shared.context.set(keys::ERROR_HANDLER, default_handler);
        debug!(
            target: targets::LOOM,
            runtime = %loom.shared.config.name,
            "runtime created"
        );
        loom
    }

    /// The runtime's configuration.
    pub fn config(&self) -> &LoomConfig {
        &self.shared.config
    }

    /// The application-wide context.
    pub fn context(&self) -> &AppContext {
        &self.shared.context
    }

    /// The event bus registration table.
    pub fn event_bus(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Creates a controller and returns its handle.
    pub fn create_controller(&self, name: impl Into<String>) -> Controller {
        let name = name.into();
        let id = self.shared.registry.write().create(name.clone());
        debug!(target: targets::CONTROLLER, controller = %name, ?id, "controller created");
        Controller::from_parts(self.clone(), id)
    }

    /// Resolves an id to a handle, if the controller still exists.
    pub fn controller(&self, id: ControllerId) -> Option<Controller> {
        if self.shared.registry.read().contains(id) {
            Some(Controller::from_parts(self.clone(), id))
        } else {
            None
        }
    }

    /// Returns `true` while the controller exists.
    pub fn contains(&self, id: ControllerId) -> bool {
        self.shared.registry.read().contains(id)
    }

    /// Number of live controllers.
    pub fn controller_count(&self) -> usize {
        self.shared.registry.read().len()
    }

    /// Handles for every controller without a parent, in arena order.
    pub fn root_controllers(&self) -> Vec<Controller> {
        let roots: Vec<ControllerId> = self
            .shared
            .registry
            .read()
            .iter()
            .filter_map(|(id, node)| node.parent.is_none().then_some(id))
            .collect();
        roots
            .into_iter()
            .map(|id| Controller::from_parts(self.clone(), id))
            .collect()
    }

    /// Sends an application event to every controller registered under
    /// its name, in registration order.
    ///
    /// An unregistered name is a no-op. Stale registrations (ids whose
    /// controller has been disposed without unregistering) are skipped.
    pub fn send_application_event(&self, event: &ApplicationEvent) {
        let subscribers = self.shared.bus.subscribers(&event.name);
        if subscribers.is_empty() {
            if self.shared.config.log_unhandled_events {
                debug!(
                    target: targets::BUS,
                    event = %event.name,
                    "application event had no listeners"
                );
            }
            return;
        }
        for id in subscribers {
            let delegate = {
                let registry = self.shared.registry.read();
                match registry.get(id) {
                    Ok(node) => Arc::clone(&node.delegate),
                    Err(_) => continue,
                }
            };
            let Some(controller) = self.controller(id) else {
                continue;
            };
            trace!(
                target: targets::BUS,
                event = %event.name,
                controller = %controller.name(),
                "delivering application event"
            );
            delegate.received_application_event(&controller, event);
        }
    }

    /// Removes the bus registrations of a controller and all of its
    /// descendants in the controller tree.
    pub fn unregister_recursively(&self, id: ControllerId) {
        let subtree = self.shared.registry.read().collect_subtree(id);
        for member in subtree {
            self.shared.bus.unregister_all(member);
        }
    }

    /// Disposes a controller: unregisters it from the bus, clears the
    /// view back-references, detaches it from its parent, re-parents its
    /// children to roots, and frees the arena slot.
    pub(crate) fn dispose_controller(&self, id: ControllerId) -> Result<()> {
        self.shared.bus.unregister_all(id);
        let (name, view) = {
            let mut registry = self.shared.registry.write();
            let node = registry.remove(id).ok_or(LoomError::ControllerGone)?;
            if let Some(parent) = node.parent
                && let Ok(parent_node) = registry.get_mut(parent)
            {
                parent_node.children.retain(|c| *c != id);
            }
            for child in &node.children {
                if let Ok(child_node) = registry.get_mut(*child) {
                    child_node.parent = None;
                }
            }
            (node.name, node.view)
        };
        if let Some(view) = view {
            let mut guard = view.write();
            guard.bag_mut().remove(keys::CONTROLLER);
            guard.bag_mut().remove(keys::MODEL);
        }
        debug!(target: targets::CONTROLLER, controller = %name, "controller disposed");
        Ok(())
    }

    pub(crate) fn with_registry_read<R>(&self, f: impl FnOnce(&ControllerRegistry) -> R) -> R {
        f(&self.shared.registry.read())
    }

    pub(crate) fn with_registry_write<R>(&self, f: impl FnOnce(&mut ControllerRegistry) -> R) -> R {
        f(&mut self.shared.registry.write())
    }
}
