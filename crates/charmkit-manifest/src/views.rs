//! Bound-declaration views
//!
//! A [`Unit`] is one instance of a [`UnitClass`] running over an
//! [`ObserverRuntime`]. Accessing a declaration through the instance yields a
//! short-lived view that borrows the unit and registers callbacks for the
//! events scoped to that declaration. Views are built on every access and
//! never cached.

use serde_yaml::Value;
use std::sync::Arc;
use tracing::debug;

use crate::declarations::{ContainerSpec, Declaration, Param, RelationSpec, StorageSpec};
use crate::errors::DeclarationError;
use crate::name::event_scope;
use crate::runtime::{Event, EventKind, EventSource, ObserverRuntime};
use crate::unit::UnitClass;

/// A running instance of a unit class.
pub struct Unit<R: ObserverRuntime> {
    class: Arc<UnitClass>,
    runtime: R,
}

impl<R: ObserverRuntime> Unit<R> {
    /// Instantiate `class` over `runtime` and observe every action handler
    /// that carries a callback on its action event.
    pub fn new(class: Arc<UnitClass>, mut runtime: R) -> Result<Self, DeclarationError> {
        for (action, handlers) in &class.collections().dispatch {
            for handler in handlers {
                let Some(callback) = &handler.callback else {
                    continue;
                };
                let source = runtime.on(&event_scope(action), EventKind::Action)?;
                debug!("Wiring {} to {}", handler.method, source);
                let callback = Arc::clone(callback);
                runtime.observe(
                    source,
                    Box::new(move |event: &mut Event| {
                        if let Some(results) = callback(&*event) {
                            event.set_results(results);
                        }
                    }),
                );
            }
        }
        Ok(Unit { class, runtime })
    }

    pub fn class(&self) -> &Arc<UnitClass> {
        &self.class
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }

    pub fn relation(&mut self, attr: &str) -> Result<RelationView<'_, R>, DeclarationError> {
        let declaration = self.class.declaration::<RelationSpec>(attr)?;
        let scope = declaration.event_scope()?;
        Ok(RelationView {
            unit: self,
            declaration,
            scope,
        })
    }

    pub fn storage(&mut self, attr: &str) -> Result<StorageView<'_, R>, DeclarationError> {
        let declaration = self.class.declaration::<StorageSpec>(attr)?;
        let scope = declaration.event_scope()?;
        Ok(StorageView {
            unit: self,
            declaration,
            scope,
        })
    }

    pub fn container(&mut self, attr: &str) -> Result<ContainerView<'_, R>, DeclarationError> {
        let declaration = self.class.declaration::<ContainerSpec>(attr)?;
        let scope = declaration.event_scope()?;
        Ok(ContainerView {
            unit: self,
            declaration,
            scope,
        })
    }

    /// Value of the config option assigned to `attr`, read from the runtime
    /// under the option's resolved name.
    pub fn config_value(&self, attr: &str) -> Result<Option<&Value>, DeclarationError> {
        let option = self.class.declaration::<Param>(attr)?;
        let name = option.name()?;
        Ok(self.runtime.config().get(name))
    }

    fn observe_scoped<F>(
        &mut self,
        scope: &str,
        kind: EventKind,
        callback: F,
    ) -> Result<(), DeclarationError>
    where
        F: FnMut(&mut Event) + 'static,
    {
        let source = self.runtime.on(scope, kind)?;
        self.runtime.observe(source, Box::new(callback));
        Ok(())
    }

    fn observe_unit<F>(&mut self, kind: EventKind, callback: F)
    where
        F: FnMut(&mut Event) + 'static,
    {
        self.runtime
            .observe(EventSource::unit(kind), Box::new(callback));
    }
}

macro_rules! lifecycle_events {
    ($($method:ident => $kind:ident),* $(,)?) => {
        impl<R: ObserverRuntime> Unit<R> {
            $(
                pub fn $method<F>(&mut self, callback: F)
                where
                    F: FnMut(&mut Event) + 'static,
                {
                    self.observe_unit(EventKind::$kind, callback);
                }
            )*
        }
    };
}

lifecycle_events! {
    on_install => Install,
    on_start => Start,
    on_stop => Stop,
    on_remove => Remove,
    on_update_status => UpdateStatus,
    on_config_changed => ConfigChanged,
    on_upgrade_charm => UpgradeCharm,
    on_pre_series_upgrade => PreSeriesUpgrade,
    on_post_series_upgrade => PostSeriesUpgrade,
    on_leader_elected => LeaderElected,
    on_leader_settings_changed => LeaderSettingsChanged,
    on_collect_metrics => CollectMetrics,
}

macro_rules! scoped_events {
    ($view:ident { $($method:ident => $kind:ident),* $(,)? }) => {
        impl<R: ObserverRuntime> $view<'_, R> {
            $(
                pub fn $method<F>(&mut self, callback: F) -> Result<(), DeclarationError>
                where
                    F: FnMut(&mut Event) + 'static,
                {
                    self.unit.observe_scoped(&self.scope, EventKind::$kind, callback)
                }
            )*
        }
    };
}

/// A relation declaration bound to a unit instance.
pub struct RelationView<'u, R: ObserverRuntime> {
    unit: &'u mut Unit<R>,
    declaration: Arc<Declaration<RelationSpec>>,
    scope: String,
}

impl<R: ObserverRuntime> RelationView<'_, R> {
    pub fn declaration(&self) -> &Arc<Declaration<RelationSpec>> {
        &self.declaration
    }

    /// Event scope (the name with hyphens replaced).
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

scoped_events!(RelationView {
    on_created => RelationCreated,
    on_joined => RelationJoined,
    on_changed => RelationChanged,
    on_departed => RelationDeparted,
    on_broken => RelationBroken,
});

/// A storage declaration bound to a unit instance.
pub struct StorageView<'u, R: ObserverRuntime> {
    unit: &'u mut Unit<R>,
    declaration: Arc<Declaration<StorageSpec>>,
    scope: String,
}

impl<R: ObserverRuntime> StorageView<'_, R> {
    pub fn declaration(&self) -> &Arc<Declaration<StorageSpec>> {
        &self.declaration
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

scoped_events!(StorageView {
    on_attached => StorageAttached,
    on_detaching => StorageDetaching,
});

/// A container declaration bound to a unit instance.
pub struct ContainerView<'u, R: ObserverRuntime> {
    unit: &'u mut Unit<R>,
    declaration: Arc<Declaration<ContainerSpec>>,
    scope: String,
}

impl<R: ObserverRuntime> ContainerView<'_, R> {
    pub fn declaration(&self) -> &Arc<Declaration<ContainerSpec>> {
        &self.declaration
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

scoped_events!(ContainerView {
    on_pebble_ready => PebbleReady,
});

#[cfg(test)]
mod tests {
    use crate::declarations::*;
    use crate::runtime::EventRecorder;
    use crate::views::*;
    use serde_yaml::Mapping;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample_class() -> Arc<UnitClass> {
        let get_data = Arc::new(action().param("foo", string("").with_default("2")));
        UnitClass::builder("Sample")
            .name("sample")
            .attr("db", require("pgsql"))
            .attr("replicas", peer("replicas").named("db-peers"))
            .attr("data", storage("filesystem").at("/var/lib/data"))
            .attr("workload", container("workload-image"))
            .attr("port", config(integer("").with_default(80)))
            .attr("get_data", &get_data)
            .handler("_on_get_data", &get_data, |event| {
                let mut results = Mapping::new();
                results.insert("echo".into(), event.params.get("foo").cloned()?);
                Some(results)
            })
            .define()
            .unwrap()
    }

    fn sample_unit() -> Unit<EventRecorder> {
        let class = sample_class();
        let recorder = EventRecorder::for_unit(&class).unwrap();
        Unit::new(class, recorder).unwrap()
    }

    #[test]
    fn test_relation_view_uses_sanitized_scope() {
        let mut unit = sample_unit();
        let seen = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&seen);
        let mut peers = unit.relation("replicas").unwrap();
        assert_eq!(peers.scope(), "db_peers");
        assert_eq!(peers.declaration().name(), Ok("db-peers"));
        peers
            .on_changed(move |_event| *counter.borrow_mut() += 1)
            .unwrap();

        let source = EventSource::scoped("db_peers", EventKind::RelationChanged);
        unit.runtime_mut().emit(&source);
        unit.runtime_mut().emit(&source);
        assert_eq!(*seen.borrow(), 2);
    }

    #[test]
    fn test_storage_and_container_views() {
        let mut unit = sample_unit();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        unit.storage("data")
            .unwrap()
            .on_attached(move |event| log.borrow_mut().push(event.source.path()))
            .unwrap();
        let log = Rc::clone(&seen);
        unit.container("workload")
            .unwrap()
            .on_pebble_ready(move |event| log.borrow_mut().push(event.source.path()))
            .unwrap();

        unit.runtime_mut()
            .emit(&EventSource::scoped("workload", EventKind::PebbleReady));
        unit.runtime_mut()
            .emit(&EventSource::scoped("data", EventKind::StorageAttached));
        assert_eq!(
            *seen.borrow(),
            vec!["workload_pebble_ready", "data_storage_attached"]
        );
    }

    #[test]
    fn test_view_access_checks_attribute() {
        let mut unit = sample_unit();
        assert!(matches!(
            unit.relation("data"),
            Err(DeclarationError::KindMismatch { .. })
        ));
        assert!(matches!(
            unit.storage("nope"),
            Err(DeclarationError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_action_handler_records_results() {
        let mut unit = sample_unit();
        let mut params = Mapping::new();
        params.insert("foo".into(), "bar".into());

        let event = unit
            .runtime_mut()
            .emit_with_params(&EventSource::scoped("get_data", EventKind::Action), params);
        let results = event.results().unwrap();
        assert_eq!(results.get("echo"), Some(&Value::from("bar")));
    }

    #[test]
    fn test_lifecycle_and_config() {
        let mut unit = sample_unit();
        let started = Rc::new(RefCell::new(false));

        let flag = Rc::clone(&started);
        unit.on_start(move |_event| *flag.borrow_mut() = true);
        unit.runtime_mut().emit(&EventSource::unit(EventKind::Start));

        assert!(*started.borrow());
        assert_eq!(unit.config_value("port").unwrap(), Some(&Value::from(80)));
        assert!(unit.config_value("db").is_err());
    }
}
