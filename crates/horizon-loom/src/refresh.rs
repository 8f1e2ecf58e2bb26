//! Deferred view refresh driven by dirty flags.
//!
//! Marking a view dirty is cheap and safe to do from anywhere; the
//! actual re-render happens in [`Controller::start_view_refresh`], and
//! only for controllers whose view is currently visible. Controllers
//! behind an unselected page of a [`PageContainer`] keep their dirty
//! flag and payload until the page is shown, so hidden tabs are never
//! rendered speculatively.
//!
//! Visibility is structural: a component is visible when its parent is
//! visible, it reports [`is_showing`], and it is not an unselected page.
//!
//! [`PageContainer`]: crate::component::PageContainer
//! [`is_showing`]: crate::component::Component::is_showing

use std::sync::Arc;

use tracing::{debug, trace};

use crate::bag::keys;
use crate::component::ComponentRc;
use crate::controller::Controller;
use crate::error::Result;
use crate::logging::targets;
use crate::runtime::ControllerId;
use crate::value::Value;

impl Controller {
    /// Marks every controller governing part of this view as dirty and,
    /// when the view is showing, refreshes the visible ones immediately.
    ///
    /// The payload travels with the dirty flag and is handed to
    /// `refresh_view` when the refresh finally runs. With no view bound,
    /// only this controller is marked.
    pub fn set_view_dirty(&self, payload: Value) -> Result<()> {
        let view = self.view()?;
        let (ids, showing) = match &view {
            Some(view) => (stamped_controllers(view), view.read().is_showing()),
            None => (vec![self.id()], false),
        };
        self.loom().with_registry_write(|r| {
            for id in &ids {
                if let Ok(node) = r.get_mut(*id) {
                    node.dirty = true;
                    node.refresh_payload = payload.clone();
                }
            }
            Ok(())
        })?;
        debug!(
            target: targets::REFRESH,
            controller = %self.name(),
            marked = ids.len(),
            "view marked dirty"
        );
        if showing {
            self.start_view_refresh(false)?;
        }
        Ok(())
    }

    /// Refreshes controllers stamped under this view.
    ///
    /// A controller is refreshed when `force` is set or when it is dirty
    /// and its view component is visible. Refreshing clears the dirty
    /// flag and consumes the payload; everything else keeps both for a
    /// later pass.
    pub fn start_view_refresh(&self, force: bool) -> Result<()> {
        let Some(view) = self.view()? else {
            return Ok(());
        };
        let mut plan: Vec<(ControllerId, bool)> = Vec::new();
        collect_refresh_plan(&view, true, &mut plan);

        let due: Vec<(ControllerId, Value)> = self.loom().with_registry_write(|r| {
            let mut due = Vec::new();
            for (id, visible) in &plan {
                let Ok(node) = r.get_mut(*id) else { continue };
                if force || (node.dirty && *visible) {
                    due.push((*id, std::mem::take(&mut node.refresh_payload)));
                    node.dirty = false;
                }
            }
            Ok(due)
        })?;

        for (id, payload) in due {
            let Some(controller) = self.loom().controller(id) else {
                continue;
            };
            let Ok(delegate) = controller.delegate() else {
                continue;
            };
            trace!(
                target: targets::REFRESH,
                controller = %controller.name(),
                "refreshing view"
            );
            delegate.refresh_view(&controller, &payload);
        }
        Ok(())
    }

    /// Whether this controller is waiting for a refresh.
    pub fn is_view_dirty(&self) -> Result<bool> {
        self.loom()
            .with_registry_read(|r| Ok(r.get(self.id())?.dirty))
    }

    /// The payload that will accompany the next refresh.
    pub fn refresh_payload(&self) -> Result<Value> {
        self.loom()
            .with_registry_read(|r| Ok(r.get(self.id())?.refresh_payload.clone()))
    }
}

/// Controller ids stamped on bags in the structural subtree, pre-order,
/// deduplicated.
fn stamped_controllers(root: &ComponentRc) -> Vec<ControllerId> {
    let mut out = Vec::new();
    let mut stack = vec![Arc::clone(root)];
    while let Some(component) = stack.pop() {
        let guard = component.read();
        if let Some(id) = guard.bag().get::<ControllerId>(keys::CONTROLLER) {
            let id = *id;
            if !out.contains(&id) {
                out.push(id);
            }
        }
        for child in guard.children().into_iter().rev() {
            stack.push(child);
        }
    }
    out
}

/// Walks the structural tree computing per-stamp visibility. A stamp
/// reached through several components is visible if any occurrence is.
fn collect_refresh_plan(
    component: &ComponentRc,
    inherited: bool,
    plan: &mut Vec<(ControllerId, bool)>,
) {
    let guard = component.read();
    let visible = inherited && guard.is_showing();
    if let Some(id) = guard.bag().get::<ControllerId>(keys::CONTROLLER) {
        let id = *id;
        if let Some(entry) = plan.iter_mut().find(|(existing, _)| *existing == id) {
            entry.1 = entry.1 || visible;
        } else {
            plan.push((id, visible));
        }
    }
    let children = guard.children();
    let current = guard.as_page_container().map(|p| p.current_page());
    drop(guard);
    for (index, child) in children.iter().enumerate() {
        let child_visible = visible && current.map_or(true, |page| page == index);
        collect_refresh_plan(child, child_visible, plan);
    }
}
