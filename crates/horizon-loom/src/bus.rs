//! Named application events and the process-wide event bus.
//!
//! Controllers anywhere in the application can register interest in an
//! event name and receive every event sent under it, without knowing the
//! sender. The bus is owned by the [`Loom`](crate::runtime::Loom) runtime
//! it belongs to; there is no global instance.
//!
//! The bus stores registrations only. Delivery happens through the
//! runtime, which resolves controller ids to live controllers and invokes
//! their `received_application_event` delegate hook in registration
//! order. Registrations never expire on their own: tearing down a
//! controller must unregister it explicitly (handled by
//! [`Controller::dispose`](crate::controller::Controller::dispose)).

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

use crate::logging::targets;
use crate::runtime::ControllerId;
use crate::value::Value;

/// A named event broadcast between controllers.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationEvent {
    /// The name listeners registered under.
    pub name: String,
    /// Payload value, `Value::Null` when the name alone is the message.
    pub value: Value,
    /// The controller that sent the event, when sent through one.
    pub source: Option<ControllerId>,
}

impl ApplicationEvent {
    /// Creates an event with a payload.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            source: None,
        }
    }

    /// Creates a payload-less event.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
    }

    /// Builder-style sender attachment.
    pub fn with_source(mut self, source: ControllerId) -> Self {
        self.source = Some(source);
        self
    }
}

/// Registration table mapping event names to interested controllers.
#[derive(Default)]
pub struct EventBus {
    registrations: RwLock<HashMap<String, Vec<ControllerId>>>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller for an event name.
    ///
    /// Idempotent: registering the same pair twice keeps the original
    /// position and does not cause double delivery.
    pub fn register(&self, name: impl Into<String>, id: ControllerId) {
        let name = name.into();
        let mut registrations = self.registrations.write();
        let listeners = registrations.entry(name).or_default();
        if !listeners.contains(&id) {
            listeners.push(id);
        }
    }

    /// Removes one registration. Unknown pairs are ignored.
    pub fn unregister(&self, name: &str, id: ControllerId) {
        let mut registrations = self.registrations.write();
        if let Some(listeners) = registrations.get_mut(name) {
            listeners.retain(|listener| *listener != id);
            if listeners.is_empty() {
                registrations.remove(name);
            }
        }
    }

    /// Removes a controller from every event name.
    pub fn unregister_all(&self, id: ControllerId) {
        let mut registrations = self.registrations.write();
        registrations.retain(|_, listeners| {
            listeners.retain(|listener| *listener != id);
            !listeners.is_empty()
        });
    }

    /// The controllers registered for `name`, in registration order.
    ///
    /// An unknown name yields an empty list; the caller treats that as a
    /// no-op send.
    pub fn subscribers(&self, name: &str) -> Vec<ControllerId> {
        let subscribers = self
            .registrations
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default();
        if subscribers.is_empty() {
            trace!(target: targets::BUS, event = name, "no listeners registered");
        }
        subscribers
    }

    /// Every name with at least one registration, sorted.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registrations.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registrations for one name.
    pub fn listener_count(&self, name: &str) -> usize {
        self.registrations
            .read()
            .get(name)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(count: usize) -> Vec<ControllerId> {
        let mut arena: SlotMap<ControllerId, ()> = SlotMap::with_key();
        (0..count).map(|_| arena.insert(())).collect()
    }

    #[test]
    fn delivery_order_is_registration_order() {
        let bus = EventBus::new();
        let ids = ids(3);
        bus.register("refresh", ids[2]);
        bus.register("refresh", ids[0]);
        bus.register("refresh", ids[1]);
        assert_eq!(bus.subscribers("refresh"), vec![ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn register_is_idempotent() {
        let bus = EventBus::new();
        let ids = ids(2);
        bus.register("save", ids[0]);
        bus.register("save", ids[1]);
        bus.register("save", ids[0]);
        assert_eq!(bus.subscribers("save"), vec![ids[0], ids[1]]);
        assert_eq!(bus.listener_count("save"), 2);
    }

    #[test]
    fn unknown_name_is_empty() {
        let bus = EventBus::new();
        assert!(bus.subscribers("nobody").is_empty());
        assert_eq!(bus.listener_count("nobody"), 0);
    }

    #[test]
    fn unregister_removes_single_pair() {
        let bus = EventBus::new();
        let ids = ids(2);
        bus.register("a", ids[0]);
        bus.register("a", ids[1]);
        bus.unregister("a", ids[0]);
        assert_eq!(bus.subscribers("a"), vec![ids[1]]);
        bus.unregister("a", ids[1]);
        assert!(bus.is_empty());
    }

    #[test]
    fn unregister_all_clears_every_name() {
        let bus = EventBus::new();
        let ids = ids(2);
        bus.register("a", ids[0]);
        bus.register("b", ids[0]);
        bus.register("b", ids[1]);
        bus.unregister_all(ids[0]);
        assert_eq!(bus.registered_names(), vec!["b".to_string()]);
        assert_eq!(bus.subscribers("b"), vec![ids[1]]);
    }
}
