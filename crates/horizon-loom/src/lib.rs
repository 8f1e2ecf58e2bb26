//! Form data binding and MVC mediation for Horizon desktop applications.
//!
//! This crate provides the controller layer that keeps form views and data
//! models synchronized:
//!
//! - **Controllers**: Mediators wiring one model to one view, arranged in a tree
//! - **Value & Model**: A dynamic value type and the model trait bound paths resolve against
//! - **Property Paths**: `billing.addresses[0].city` style accessors with null-safe reads
//! - **Capabilities**: Contracts widgets implement to take part in binding
//! - **Change Tracking**: Snapshot baselines, a coarse dirty flag, and cancel/restore
//! - **Validation**: Aggregated validity and sync partitions across a view
//! - **View Refresh**: Visibility-aware deferred re-rendering
//! - **Event Bus**: Named application events with explicit per-controller registration
//!
//! # Binding Example
//!
//! ```
//! use horizon_loom::{Loom, MapModel, PropertyPath, Value};
//!
//! let loom = Loom::new();
//! let controller = loom.create_controller("person-form");
//!
//! let model = MapModel::new()
//!     .with("name", "Bob")
//!     .with("age", 42i64)
//!     .into_shared();
//! controller.set_model(Some(model.clone())).unwrap();
//!
//! // Paths resolve against the model without any widgets attached.
//! let path = PropertyPath::parse("name").unwrap();
//! assert_eq!(path.read(&*model.read()).unwrap(), Value::from("Bob"));
//!
//! // A freshly wired controller reports no changes.
//! assert!(!controller.has_view_changes().unwrap());
//! ```
//!
//! # Application Event Example
//!
//! ```
//! use horizon_loom::{ApplicationEvent, Loom, Value};
//!
//! let loom = Loom::new();
//! let list = loom.create_controller("order-list");
//!
//! // Controllers opt in to the events they care about; delivery goes
//! // through each registered controller's delegate.
//! list.register_for_event("orders.changed");
//! loom.send_application_event(&ApplicationEvent::new("orders.changed", Value::from(17i64)));
//!
//! list.unregister_from_all_events();
//! assert!(loom.event_bus().is_empty());
//! ```

pub mod bag;
pub mod bus;
mod changes;
pub mod component;
mod context;
mod controller;
pub mod dispatch;
mod error;
pub mod logging;
pub mod path;
mod refresh;
mod runtime;
mod sync;
mod validation;
pub mod value;

pub use bag::PropertyBag;
pub use bus::{ApplicationEvent, EventBus};
pub use changes::ChangeListener;
pub use component::{
    Binding, Component, ComponentRc, ControllerAware, MultiFieldBound, PageContainer,
    ReferenceSharing, SelfValidating, SingleBound, Snapshot, collect_bound_components,
    for_each_component,
};
pub use context::AppContext;
pub use controller::{Controller, ControllerDelegate, DefaultDelegate};
pub use dispatch::{Handler, HandlerArgs, HandlerKind, HandlerTable, handler_name, normalize_path};
pub use error::{ErrorHandler, LoggingErrorHandler, LoomError, Result, Severity};
pub use logging::{ControllerTreeDebug, TreeFormatOptions, TreeStyle};
pub use path::{PathAccessor, PathSegment, PropertyPath};
pub use runtime::{ControllerId, Loom, LoomConfig};
pub use sync::CopyDirection;
pub use validation::{ValidationFailure, ValidationListener};
pub use value::{MapModel, Model, ModelChangeEvent, ModelRc, Value};

// Re-export the lock type used inside ModelRc and ComponentRc so
// applications can construct shared models and components without
// depending on parking_lot directly.
pub use parking_lot::RwLock;

