//! Error types for the binding framework.
//!
//! Most failures in a form-binding layer are recoverable: a stale path, a
//! widget that cannot clone its value, a handler that was never registered.
//! Operations therefore funnel errors into an [`ErrorHandler`] resolved
//! through the controller context chain instead of unwinding the UI. The
//! default handler logs and swallows; applications install their own by
//! placing one under [`keys::ERROR_HANDLER`](crate::bag::keys::ERROR_HANDLER)
//! in a controller context or the application context.

use crate::controller::Controller;
use crate::logging::targets;
use crate::sync::CopyDirection;
use crate::value::Value;

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, LoomError>;

/// Errors that can occur while mediating between models and views.
#[derive(Debug, thiserror::Error)]
pub enum LoomError {
    /// A path segment could not be resolved against the model.
    ///
    /// Raised for missing fields, indexing past the end of a list,
    /// keyed lookup on a non-map value, or traversal into a scalar.
    #[error("cannot resolve '{path}': {reason}")]
    PropertyAccess { path: String, reason: String },

    /// No handler is registered under the given name.
    ///
    /// Soft by contract: dispatch sites log the miss and continue.
    #[error("no handler registered for '{name}'")]
    HandlerNotFound { name: String },

    /// A self-validating component rejected its current value.
    #[error("component '{component}' rejected value {value:?}")]
    Validation { component: String, value: Value },

    /// A single field copy between model and view failed.
    #[error("model copy ({direction}) failed for '{path}': {source}")]
    ModelCopy {
        path: String,
        direction: CopyDirection,
        /// The value being moved when the failure occurred, if known.
        value: Option<Value>,
        #[source]
        source: Box<LoomError>,
    },

    /// A reference-sharing component failed to produce a deep copy.
    #[error("clone of shared value failed: {reason}")]
    CloneModel { reason: String },

    /// A reference-sharing component failed to compare values.
    #[error("equality check of shared value failed: {reason}")]
    EqualsModel { reason: String },

    /// A binding path is malformed or names fields the model does not declare.
    #[error("invalid binding path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The controller behind a handle has been disposed.
    #[error("controller is no longer registered")]
    ControllerGone,

    /// Attaching a controller under itself or one of its descendants.
    #[error("cannot attach a controller to itself or its own descendant")]
    CircularParentage,
}

/// How severe an error is when routed to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected in normal operation; logged at debug level.
    Soft,
    /// A real failure; logged at error level.
    Error,
}

impl LoomError {
    /// Create a property access error.
    pub fn property_access(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PropertyAccess {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing-handler error.
    pub fn handler_not_found(name: impl Into<String>) -> Self {
        Self::HandlerNotFound { name: name.into() }
    }

    /// Create a validation error.
    pub fn validation(component: impl Into<String>, value: Value) -> Self {
        Self::Validation {
            component: component.into(),
            value,
        }
    }

    /// Wrap a failure that occurred while copying a single field.
    pub fn model_copy(
        path: impl Into<String>,
        direction: CopyDirection,
        value: Option<Value>,
        source: LoomError,
    ) -> Self {
        Self::ModelCopy {
            path: path.into(),
            direction,
            value,
            source: Box::new(source),
        }
    }

    /// Create a clone-failure error.
    pub fn clone_model(reason: impl Into<String>) -> Self {
        Self::CloneModel {
            reason: reason.into(),
        }
    }

    /// Create an equality-failure error.
    pub fn equals_model(reason: impl Into<String>) -> Self {
        Self::EqualsModel {
            reason: reason.into(),
        }
    }

    /// Create an invalid-path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Severity used by handlers to pick a log level.
    pub fn severity(&self) -> Severity {
        match self {
            Self::HandlerNotFound { .. } => Severity::Soft,
            _ => Severity::Error,
        }
    }

    /// Whether this error is expected traffic rather than a failure.
    pub fn is_soft(&self) -> bool {
        self.severity() == Severity::Soft
    }
}

/// Receives errors funneled out of binding operations.
///
/// Handlers are resolved through the controller context chain (own context,
/// then ancestors, then the application context), so a subtree can install
/// a stricter handler without affecting the rest of the application.
pub trait ErrorHandler: Send + Sync {
    /// Called with the controller on whose behalf the operation ran.
    fn handle_error(&self, controller: &Controller, error: &LoomError);
}

/// Default handler: log by severity and continue.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn handle_error(&self, controller: &Controller, error: &LoomError) {
        match error.severity() {
            Severity::Soft => tracing::debug!(
                target: targets::CONTROLLER,
                controller = %controller.name(),
                error = %error,
                "soft binding error"
            ),
            Severity::Error => tracing::error!(
                target: targets::CONTROLLER,
                controller = %controller.name(),
                error = %error,
                "binding error"
            ),
        }
    }
}
