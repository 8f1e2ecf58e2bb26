//! Change tracking against snapshot baselines.
//!
//! Two layers answer "did the user change anything":
//!
//! * a coarse per-controller flag, set by the user-edit flow and read by
//!   [`Controller::has_view_changes`], cheap enough for window-close
//!   checks;
//! * per-component snapshots stored in each [`Binding`], captured by
//!   [`Controller::reset_changes`] and compared by
//!   [`Controller::has_changes`], for precise "which fields" answers and
//!   for restoring the last accepted state with
//!   [`Controller::cancel_changes`].
//!
//! A component with no captured baseline never reports changes, and a
//! baseline is required before a cancel can restore anything. A
//! self-validating component holding an invalid value always counts as
//! changed, so an unparseable entry can never be mistaken for "nothing
//! to save".
//!
//! [`Binding`]: crate::component::Binding

use std::sync::Arc;

use tracing::{debug, trace};

use crate::component::{ComponentRc, Snapshot, collect_bound_components};
use crate::controller::Controller;
use crate::error::Result;
use crate::logging::targets;
use crate::value::{ModelChangeEvent, Value};

/// Observes a controller's change-tracking lifecycle.
///
/// Registered with [`Controller::add_change_listener`]; both methods
/// default to no-ops so a listener implements only what it needs.
pub trait ChangeListener: Send + Sync {
    /// A user edit was stored in the model.
    fn view_changed(&self, controller: &Controller, event: &ModelChangeEvent) {
        let _ = (controller, event);
    }

    /// The baseline was re-captured or restored; the view is clean.
    fn changes_reset(&self, controller: &Controller) {
        let _ = controller;
    }
}

impl Controller {
    /// Registers a change listener.
    pub fn add_change_listener(&self, listener: Arc<dyn ChangeListener>) -> Result<()> {
        self.loom().with_registry_write(|r| {
            r.get_mut(self.id())?.change_listeners.push(listener);
            Ok(())
        })
    }

    /// Removes a change listener by identity. Returns whether it was
    /// registered.
    pub fn remove_change_listener(&self, listener: &Arc<dyn ChangeListener>) -> Result<bool> {
        self.loom().with_registry_write(|r| {
            let listeners = &mut r.get_mut(self.id())?.change_listeners;
            let before = listeners.len();
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
            Ok(listeners.len() != before)
        })
    }

    pub(crate) fn change_listeners(&self) -> Result<Vec<Arc<dyn ChangeListener>>> {
        self.loom()
            .with_registry_read(|r| Ok(r.get(self.id())?.change_listeners.clone()))
    }

    /// Whether any user edit reached the model since the last reset.
    ///
    /// Reads the coarse flag only; no component is inspected.
    pub fn has_view_changes(&self) -> Result<bool> {
        self.loom()
            .with_registry_read(|r| Ok(r.get(self.id())?.view_changed))
    }

    /// Sets the coarse view-changed flag directly.
    pub fn set_view_changed(&self, changed: bool) -> Result<()> {
        self.loom().with_registry_write(|r| {
            r.get_mut(self.id())?.view_changed = changed;
            Ok(())
        })
    }

    /// Captures the component's current value(s) as its clean baseline.
    ///
    /// Reference-sharing components are snapshotted through
    /// `clone_bound_value`, so later comparisons run against a value the
    /// model cannot mutate behind the snapshot's back. A failed clone is
    /// reported and clears the baseline.
    pub fn reset_changes(&self, component: &ComponentRc) {
        let (snapshot, funnel) = {
            let guard = component.read();
            if guard.binding().is_none() {
                return;
            }
            if let Some(shared) = guard.as_reference_sharing() {
                match shared.clone_bound_value() {
                    Ok(value) => (Some(Snapshot::of_value(value)), None),
                    Err(error) => (None, Some(error)),
                }
            } else if let Some(multi) = guard.as_multi_field() {
                let fields = multi
                    .field_names()
                    .into_iter()
                    .map(|name| {
                        let value = multi.field_value(&name);
                        (name, value)
                    })
                    .collect();
                (Some(Snapshot::of_fields(fields)), None)
            } else if let Some(single) = guard.as_single_bound() {
                (Some(Snapshot::of_value(single.bound_value())), None)
            } else {
                (None, None)
            }
        };
        {
            let mut guard = component.write();
            if let Some(binding) = guard.binding_mut() {
                match snapshot {
                    Some(snapshot) => binding.set_snapshot(snapshot),
                    None => binding.clear_snapshot(),
                }
            }
        }
        if let Some(error) = funnel {
            self.report_error(&error);
        }
    }

    /// Whether the component's current value(s) differ from its baseline.
    ///
    /// With no baseline captured there is nothing to diff against, so
    /// the component reports no changes (the invalid override below
    /// still applies). A failed shared-value comparison is reported and
    /// counts as changed; losing an edit is worse than a spurious save
    /// prompt.
    pub fn has_changes(&self, component: &ComponentRc) -> bool {
        let (changed, funnel) = {
            let guard = component.read();
            let Some(binding) = guard.binding() else {
                return false;
            };

            if let Some(validating) = guard.as_self_validating()
                && !validating.is_current_value_valid()
            {
                (true, None)
            } else if binding.snapshot().is_none() {
                (false, None)
            } else if let Some(shared) = guard.as_reference_sharing() {
                let baseline = binding
                    .snapshot()
                    .and_then(|s| s.value.clone())
                    .unwrap_or_default();
                match shared.bound_value_equals(&baseline) {
                    Ok(equal) => (!equal, None),
                    Err(error) => (true, Some(error)),
                }
            } else if let Some(multi) = guard.as_multi_field() {
                let names = multi.field_names();
                let changed = binding.snapshot().is_some_and(|snapshot| {
                    names.iter().any(|name| {
                        let current = multi.field_value(name);
                        match snapshot.fields.iter().find(|(field, _)| field == name) {
                            Some((_, captured)) => *captured != current,
                            None => current != Value::Null,
                        }
                    }) || snapshot
                        .fields
                        .iter()
                        .any(|(field, _)| !names.iter().any(|name| name == field))
                });
                (changed, None)
            } else if let Some(single) = guard.as_single_bound() {
                let current = single.bound_value();
                let changed = match binding.snapshot().and_then(|s| s.value.clone()) {
                    Some(captured) => captured != current,
                    None => current != Value::Null,
                };
                (changed, None)
            } else {
                (false, None)
            }
        };
        if let Some(error) = funnel {
            self.report_error(&error);
        }
        changed
    }

    /// Restores the component from its baseline and writes the restored
    /// value(s) back into the model.
    ///
    /// Acts only when [`Controller::has_changes`] reports a difference
    /// and a baseline was captured; returns whether a cancellation
    /// occurred. The restored component is re-snapshotted, so a second
    /// cancel is a no-op. Missing baseline entries of a multi-field
    /// component restore to [`Value::Null`].
    pub fn cancel_changes(&self, component: &ComponentRc) -> Result<bool> {
        if !self.has_changes(component) {
            return Ok(false);
        }
        let Some(snapshot) = component
            .read()
            .binding()
            .and_then(|b| b.snapshot().cloned())
        else {
            // An invalid component can report changes with no baseline
            // captured; there is nothing to restore then.
            return Ok(false);
        };

        let is_multi = {
            let mut guard = component.write();
            if let Some(multi) = guard.as_multi_field_mut() {
                for name in multi.field_names() {
                    let value = snapshot
                        .fields
                        .iter()
                        .find(|(field, _)| field == &name)
                        .map(|(_, value)| value.clone())
                        .unwrap_or_default();
                    multi.set_field_value(&name, value);
                }
                true
            } else if let Some(single) = guard.as_single_bound_mut() {
                single.set_bound_value(snapshot.value.clone().unwrap_or_default());
                false
            } else {
                return Ok(false);
            }
        };

        if let Some(model) = self.model()? {
            if is_multi {
                self.copy_fields_to_model(component, &model, None);
            } else {
                self.copy_value_to_model(component, &model, None);
            }
        }
        self.reset_changes(component);
        trace!(
            target: targets::CHANGES,
            controller = %self.name(),
            component = %component.read().name(),
            "baseline restored"
        );
        Ok(true)
    }

    /// Re-captures baselines for every bound component, clears the coarse
    /// flag, and notifies change listeners.
    ///
    /// Called by `setup_mvc` after the initial copy and by applications
    /// after a successful save.
    pub fn reset_view_changes(&self) -> Result<()> {
        self.set_view_changed(false)?;
        if let Some(view) = self.view()? {
            for component in collect_bound_components(&view) {
                self.reset_changes(&component);
            }
        }
        for listener in self.change_listeners()? {
            listener.changes_reset(self);
        }
        trace!(
            target: targets::CHANGES,
            controller = %self.name(),
            "change baseline captured"
        );
        Ok(())
    }

    /// Restores every bound component from its baseline, clears the
    /// coarse flag, and notifies change listeners.
    ///
    /// Returns whether any component was restored.
    pub fn cancel_view_changes(&self) -> Result<bool> {
        let mut cancelled = false;
        if let Some(view) = self.view()? {
            for component in collect_bound_components(&view) {
                cancelled |= self.cancel_changes(&component)?;
            }
        }
        self.set_view_changed(false)?;
        for listener in self.change_listeners()? {
            listener.changes_reset(self);
        }
        debug!(
            target: targets::CHANGES,
            controller = %self.name(),
            "view changes cancelled"
        );
        Ok(cancelled)
    }

    /// The bound components whose values differ from their baselines.
    pub fn changed_components(&self) -> Result<Vec<ComponentRc>> {
        let Some(view) = self.view()? else {
            return Ok(Vec::new());
        };
        Ok(collect_bound_components(&view)
            .into_iter()
            .filter(|component| self.has_changes(component))
            .collect())
    }
}
