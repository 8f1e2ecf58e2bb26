//! Bulk synchronization between a controller's model and its view.
//!
//! Copies run over every bound component under the view root, multi-field
//! components before single-value ones, so container widgets settle their
//! rows before individual editors read from them. Both directions are
//! best effort: a failing component is reported through the delegate's
//! `model_read_failed` / `model_write_failed` hook and the copy moves on.
//!
//! Rules:
//!
//! * `copy_to_view` with no model bound pushes [`Value::Null`] into every
//!   bound component, clearing the form.
//! * `copy_to_model` with no model bound is a no-op.
//! * Read-only bindings are skipped by `copy_to_model` only; they still
//!   receive values from the model.
//! * An optional filter restricts the copy to paths starting with the
//!   given text (matched against the raw path).

use std::fmt;

use tracing::{debug_span, trace};

use crate::component::{ComponentRc, collect_bound_components};
use crate::controller::Controller;
use crate::error::{LoomError, Result};
use crate::logging::targets;
use crate::path::PropertyPath;
use crate::value::{ModelRc, Value};

/// Direction of a model copy, carried in copy errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDirection {
    ModelToView,
    ViewToModel,
}

impl fmt::Display for CopyDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelToView => f.write_str("model to view"),
            Self::ViewToModel => f.write_str("view to model"),
        }
    }
}

impl Controller {
    /// Copies model values into every bound component under the view.
    ///
    /// `filter` restricts the copy to bound paths starting with the given
    /// text; `None` copies everything. With no model bound, components
    /// receive [`Value::Null`].
    pub fn copy_to_view(&self, filter: Option<&str>) -> Result<()> {
        let Some(view) = self.view()? else {
            trace!(target: targets::SYNC, "copy to view skipped: no view bound");
            return Ok(());
        };
        let model = self.model()?;
        let _span = debug_span!(
            target: targets::SYNC,
            "copy_to_view",
            controller = %self.name()
        )
        .entered();

        let (multi, single): (Vec<_>, Vec<_>) = collect_bound_components(&view)
            .into_iter()
            .partition(|c| c.read().as_multi_field().is_some());
        for component in &multi {
            self.copy_fields_to_component(component, model.as_ref(), filter);
        }
        for component in &single {
            self.copy_value_to_component(component, model.as_ref(), filter);
        }
        Ok(())
    }

    /// Copies component values into the model for every bound component
    /// under the view.
    ///
    /// `filter` restricts the copy as in [`Controller::copy_to_view`].
    /// Read-only bindings are skipped. No change events are emitted;
    /// callers pulling a whole form into the model are expected to know
    /// it changed.
    pub fn copy_to_model(&self, filter: Option<&str>) -> Result<()> {
        let Some(view) = self.view()? else {
            trace!(target: targets::SYNC, "copy to model skipped: no view bound");
            return Ok(());
        };
        let Some(model) = self.model()? else {
            trace!(target: targets::SYNC, "copy to model skipped: no model bound");
            return Ok(());
        };
        let _span = debug_span!(
            target: targets::SYNC,
            "copy_to_model",
            controller = %self.name()
        )
        .entered();

        let (multi, single): (Vec<_>, Vec<_>) = collect_bound_components(&view)
            .into_iter()
            .partition(|c| c.read().as_multi_field().is_some());
        for component in &multi {
            self.copy_fields_to_model(component, &model, filter);
        }
        for component in &single {
            self.copy_value_to_model(component, &model, filter);
        }
        Ok(())
    }

    fn copy_value_to_component(
        &self,
        component: &ComponentRc,
        model: Option<&ModelRc>,
        filter: Option<&str>,
    ) {
        let path = {
            let guard = component.read();
            if guard.as_single_bound().is_none() {
                return;
            }
            let Some(path) = guard.binding().and_then(|b| b.path().cloned()) else {
                return;
            };
            path
        };
        if let Some(prefix) = filter
            && !path.as_str().starts_with(prefix)
        {
            return;
        }
        let value = match model {
            None => Value::Null,
            Some(model) => {
                // Drop the model guard before reporting through the delegate.
                let read = path.read(&*model.read());
                match read {
                    Ok(value) => value,
                    Err(error) => {
                        self.read_failed(path.as_str(), error);
                        return;
                    }
                }
            }
        };
        trace!(target: targets::SYNC, path = %path, "model to view");
        let mut guard = component.write();
        if let Some(single) = guard.as_single_bound_mut() {
            single.set_bound_value(value);
        }
    }

    fn copy_fields_to_component(
        &self,
        component: &ComponentRc,
        model: Option<&ModelRc>,
        filter: Option<&str>,
    ) {
        let names: Vec<String> = {
            let guard = component.read();
            match guard.as_multi_field() {
                Some(multi) => multi.field_names(),
                None => return,
            }
        };
        let mut updates: Vec<(String, Value)> = Vec::new();
        for name in names {
            if let Some(prefix) = filter
                && !name.starts_with(prefix)
            {
                continue;
            }
            let value = match model {
                None => Value::Null,
                Some(model) => {
                    let path = match PropertyPath::parse(&name) {
                        Ok(path) => path,
                        Err(error) => {
                            self.read_failed(&name, error);
                            continue;
                        }
                    };
                    let read = path.read(&*model.read());
                    match read {
                        Ok(value) => value,
                        Err(error) => {
                            self.read_failed(&name, error);
                            continue;
                        }
                    }
                }
            };
            updates.push((name, value));
        }
        if updates.is_empty() {
            return;
        }
        let mut guard = component.write();
        if let Some(multi) = guard.as_multi_field_mut() {
            for (name, value) in updates {
                trace!(target: targets::SYNC, field = %name, "model to view");
                multi.set_field_value(&name, value);
            }
        }
    }

    pub(crate) fn copy_value_to_model(
        &self,
        component: &ComponentRc,
        model: &ModelRc,
        filter: Option<&str>,
    ) {
        let (path, value) = {
            let guard = component.read();
            let Some(binding) = guard.binding() else { return };
            if binding.is_read_only() {
                trace!(
                    target: targets::SYNC,
                    path = binding.path_text().unwrap_or(""),
                    "read-only binding skipped"
                );
                return;
            }
            let Some(path) = binding.path().cloned() else { return };
            let Some(single) = guard.as_single_bound() else { return };
            (path, single.bound_value())
        };
        if let Some(prefix) = filter
            && !path.as_str().starts_with(prefix)
        {
            return;
        }
        let written = path.write(&mut *model.write(), value.clone());
        match written {
            Ok(true) => trace!(target: targets::SYNC, path = %path, "view to model"),
            Ok(false) => {
                trace!(target: targets::SYNC, path = %path, "write skipped: null intermediate");
            }
            Err(error) => self.write_failed(path.as_str(), value, error),
        }
    }

    pub(crate) fn copy_fields_to_model(
        &self,
        component: &ComponentRc,
        model: &ModelRc,
        filter: Option<&str>,
    ) {
        let entries: Vec<(String, Value)> = {
            let guard = component.read();
            let Some(multi) = guard.as_multi_field() else { return };
            if guard.binding().is_some_and(|b| b.is_read_only()) {
                trace!(
                    target: targets::SYNC,
                    component = guard.name(),
                    "read-only binding skipped"
                );
                return;
            }
            multi
                .field_names()
                .into_iter()
                .map(|name| {
                    let value = multi.field_value(&name);
                    (name, value)
                })
                .collect()
        };
        for (name, value) in entries {
            if let Some(prefix) = filter
                && !name.starts_with(prefix)
            {
                continue;
            }
            let path = match PropertyPath::parse(&name) {
                Ok(path) => path,
                Err(error) => {
                    self.write_failed(&name, value, error);
                    continue;
                }
            };
            let written = path.write(&mut *model.write(), value.clone());
            match written {
                Ok(true) => trace!(target: targets::SYNC, field = %name, "view to model"),
                Ok(false) => {
                    trace!(target: targets::SYNC, field = %name, "write skipped: null intermediate");
                }
                Err(error) => self.write_failed(&name, value, error),
            }
        }
    }

    pub(crate) fn read_failed(&self, path: &str, error: LoomError) {
        let error = LoomError::model_copy(path, CopyDirection::ModelToView, None, error);
        match self.delegate() {
            Ok(delegate) => delegate.model_read_failed(self, &error),
            Err(gone) => self.report_error(&gone),
        }
    }

    fn write_failed(&self, path: &str, value: Value, error: LoomError) {
        let error = LoomError::model_copy(path, CopyDirection::ViewToModel, Some(value), error);
        match self.delegate() {
            Ok(delegate) => delegate.model_write_failed(self, &error),
            Err(gone) => self.report_error(&gone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::PropertyBag;
    use crate::component::{Binding, Component, MultiFieldBound, SingleBound};
    use crate::controller::ControllerDelegate;
    use crate::runtime::Loom;
    use crate::value::{MapModel, Model};
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct Field {
        bag: PropertyBag,
        binding: Option<Binding>,
        value: Value,
        log: Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    }

    impl Field {
        fn bound(tag: &'static str, path: &str, log: &Arc<Mutex<Vec<String>>>) -> ComponentRc {
            Arc::new(RwLock::new(Self {
                bag: PropertyBag::new(),
                binding: Some(Binding::new(path).unwrap()),
                value: Value::Null,
                log: Arc::clone(log),
                tag,
            }))
        }
    }

    impl Component for Field {
        fn bag(&self) -> &PropertyBag {
            &self.bag
        }

        fn bag_mut(&mut self) -> &mut PropertyBag {
            &mut self.bag
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
    }

    impl SingleBound for Field {
        fn bound_value(&self) -> Value {
            self.value.clone()
        }

        fn set_bound_value(&mut self, value: Value) {
            self.log.lock().unwrap().push(format!("{}:set", self.tag));
            self.value = value;
        }
    }

    struct Grid {
        bag: PropertyBag,
        binding: Option<Binding>,
        fields: HashMap<String, Value>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Grid {
        fn bound(names: &[&str], log: &Arc<Mutex<Vec<String>>>) -> ComponentRc {
            Arc::new(RwLock::new(Self {
                bag: PropertyBag::new(),
                binding: Some(Binding::unbound()),
                fields: names.iter().map(|n| (n.to_string(), Value::Null)).collect(),
                log: Arc::clone(log),
            }))
        }
    }

    impl Component for Grid {
        fn bag(&self) -> &PropertyBag {
            &self.bag
        }

        fn bag_mut(&mut self) -> &mut PropertyBag {
            &mut self.bag
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

    impl MultiFieldBound for Grid {
        fn field_names(&self) -> Vec<String> {
            let mut names: Vec<String> = self.fields.keys().cloned().collect();
            names.sort();
            names
        }

        fn field_value(&self, field: &str) -> Value {
            self.fields.get(field).cloned().unwrap_or_default()
        }

        fn set_field_value(&mut self, field: &str, value: Value) {
            self.log.lock().unwrap().push(format!("grid:{field}"));
            self.fields.insert(field.to_string(), value);
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

    fn single_value(component: &ComponentRc) -> Value {
        component.read().as_single_bound().unwrap().bound_value()
    }

    #[test]
    fn direction_renders_lowercase() {
        assert_eq!(CopyDirection::ModelToView.to_string(), "model to view");
        assert_eq!(CopyDirection::ViewToModel.to_string(), "view to model");
    }

    #[test]
    fn multi_field_components_copy_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let loom = Loom::new();
        let controller = loom.create_controller("order");

        let field = Field::bound("total", "total", &log);
        let grid = Grid::bound(&["total"], &log);
        let view = Panel::with(vec![Arc::clone(&field), Arc::clone(&grid)]);

        let model = MapModel::new().with("total", 42i64).into_shared();
        controller.set_model(Some(model)).unwrap();
        controller.set_view(Some(view)).unwrap();
        controller.copy_to_view(None).unwrap();

        // Grid settles before the single-value editor even though the
        // editor comes first in the tree.
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &["grid:total".to_string(), "total:set".to_string()]
        );
        assert_eq!(single_value(&field), Value::from(42i64));
    }

    #[test]
    fn missing_model_clears_components() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let loom = Loom::new();
        let controller = loom.create_controller("form");
        let field = Field::bound("name", "name", &log);
        {
            let mut guard = field.write();
            guard.as_single_bound_mut().unwrap().set_bound_value(Value::from("stale"));
        }
        controller.set_view(Some(Arc::clone(&field))).unwrap();

        controller.copy_to_view(None).unwrap();
        assert_eq!(single_value(&field), Value::Null);
    }

    #[test]
    fn filter_restricts_by_path_prefix() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let loom = Loom::new();
        let controller = loom.create_controller("form");

        let name = Field::bound("name", "name", &log);
        let city = Field::bound("city", "address.city", &log);
        let view = Panel::with(vec![Arc::clone(&name), Arc::clone(&city)]);

        let address = MapModel::new().with("city", "Rome").into_shared();
        let model = MapModel::new()
            .with("name", "Bob")
            .with("address", Value::Object(address))
            .into_shared();
        controller.set_model(Some(model)).unwrap();
        controller.set_view(Some(view)).unwrap();

        controller.copy_to_view(Some("address")).unwrap();
        assert_eq!(single_value(&name), Value::Null);
        assert_eq!(single_value(&city), Value::from("Rome"));
    }

    #[test]
    fn copy_to_model_skips_read_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let loom = Loom::new();
        let controller = loom.create_controller("form");

        let name = Field::bound("name", "name", &log);
        let badge = Field::bound("badge", "badge", &log);
        badge.write().binding_mut().unwrap().set_read_only(true);
        let view = Panel::with(vec![Arc::clone(&name), Arc::clone(&badge)]);

        let model = MapModel::new().with("name", "Bob").with("badge", 7i64).into_shared();
        controller.setup_mvc(Arc::clone(&model) as ModelRc, view).unwrap();

        name.write().as_single_bound_mut().unwrap().set_bound_value(Value::from("Alice"));
        badge.write().as_single_bound_mut().unwrap().set_bound_value(Value::from(99i64));
        controller.copy_to_model(None).unwrap();

        let guard = model.read();
        assert_eq!(guard.get_field("name"), Some(Value::from("Alice")));
        assert_eq!(guard.get_field("badge"), Some(Value::from(7i64)));
    }

    #[test]
    fn failing_read_reports_and_continues() {
        #[derive(Default)]
        struct Capture {
            errors: Mutex<Vec<String>>,
        }

        impl ControllerDelegate for Capture {
            fn model_read_failed(&self, _controller: &Controller, error: &LoomError) {
                self.errors.lock().unwrap().push(error.to_string());
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let loom = Loom::new();
        let controller = loom.create_controller("form");
        let capture = Arc::new(Capture::default());
        controller.set_delegate(capture.clone()).unwrap();

        let broken = Field::bound("broken", "no_such_field", &log);
        let name = Field::bound("name", "name", &log);
        let view = Panel::with(vec![Arc::clone(&broken), Arc::clone(&name)]);

        let model = MapModel::new().with("name", "Bob").into_shared();
        controller.set_model(Some(model)).unwrap();
        controller.set_view(Some(view)).unwrap();
        controller.copy_to_view(None).unwrap();

        assert_eq!(single_value(&name), Value::from("Bob"));
        let errors = capture.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("model to view"));
    }
}
