//! Observer runtime
//!
//! The seam between bound declarations and whatever delivers events to a
//! unit. [`ObserverRuntime`] resolves event sources and stores callbacks;
//! [`EventRecorder`] is the in-memory implementation used for local runs and
//! tests.

use ahash::AHashSet;
use serde_yaml::{Mapping, Value};
use std::fmt;
use tracing::{debug, trace};

use crate::declarations::DeclarationKind;
use crate::errors::DeclarationError;
use crate::unit::UnitClass;

/// What happened. Scoped kinds belong to a named declaration; the rest are
/// unit lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Start,
    Stop,
    Remove,
    UpdateStatus,
    ConfigChanged,
    UpgradeCharm,
    PreSeriesUpgrade,
    PostSeriesUpgrade,
    LeaderElected,
    LeaderSettingsChanged,
    CollectMetrics,
    RelationCreated,
    RelationJoined,
    RelationChanged,
    RelationDeparted,
    RelationBroken,
    StorageAttached,
    StorageDetaching,
    PebbleReady,
    Action,
}

impl EventKind {
    /// Event name suffix, appended to the scope for scoped kinds.
    pub fn suffix(self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Start => "start",
            EventKind::Stop => "stop",
            EventKind::Remove => "remove",
            EventKind::UpdateStatus => "update_status",
            EventKind::ConfigChanged => "config_changed",
            EventKind::UpgradeCharm => "upgrade_charm",
            EventKind::PreSeriesUpgrade => "pre_series_upgrade",
            EventKind::PostSeriesUpgrade => "post_series_upgrade",
            EventKind::LeaderElected => "leader_elected",
            EventKind::LeaderSettingsChanged => "leader_settings_changed",
            EventKind::CollectMetrics => "collect_metrics",
            EventKind::RelationCreated => "relation_created",
            EventKind::RelationJoined => "relation_joined",
            EventKind::RelationChanged => "relation_changed",
            EventKind::RelationDeparted => "relation_departed",
            EventKind::RelationBroken => "relation_broken",
            EventKind::StorageAttached => "storage_attached",
            EventKind::StorageDetaching => "storage_detaching",
            EventKind::PebbleReady => "pebble_ready",
            EventKind::Action => "action",
        }
    }

    /// Kind of declaration that scopes this event, if any.
    pub fn scope_kind(self) -> Option<DeclarationKind> {
        match self {
            EventKind::RelationCreated
            | EventKind::RelationJoined
            | EventKind::RelationChanged
            | EventKind::RelationDeparted
            | EventKind::RelationBroken => Some(DeclarationKind::Relation),
            EventKind::StorageAttached | EventKind::StorageDetaching => {
                Some(DeclarationKind::Storage)
            }
            EventKind::PebbleReady => Some(DeclarationKind::Container),
            EventKind::Action => Some(DeclarationKind::Action),
            _ => None,
        }
    }
}

/// A resolved event source, e.g. `db_peers` + `relation_changed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventSource {
    scope: Option<String>,
    kind: EventKind,
}

impl EventSource {
    /// A lifecycle event of the unit itself.
    pub fn unit(kind: EventKind) -> Self {
        EventSource { scope: None, kind }
    }

    /// An event of a named declaration; `scope` is already sanitized.
    pub fn scoped(scope: impl Into<String>, kind: EventKind) -> Self {
        EventSource {
            scope: Some(scope.into()),
            kind,
        }
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Full event name as delivered by the runtime.
    pub fn path(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}_{}", scope, self.kind.suffix()),
            None => self.kind.suffix().to_string(),
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A delivered event.
#[derive(Debug, Clone)]
pub struct Event {
    pub source: EventSource,
    /// Action parameters; empty for other events.
    pub params: Mapping,
    results: Option<Mapping>,
}

impl Event {
    pub fn new(source: EventSource) -> Self {
        Event {
            source,
            params: Mapping::new(),
            results: None,
        }
    }

    pub fn set_results(&mut self, results: Mapping) {
        self.results = Some(results);
    }

    pub fn results(&self) -> Option<&Mapping> {
        self.results.as_ref()
    }
}

pub type Callback = Box<dyn FnMut(&mut Event)>;

/// Event delivery used by bound views.
pub trait ObserverRuntime {
    /// Resolve the event source `kind` scoped to `scope`.
    fn on(&self, scope: &str, kind: EventKind) -> Result<EventSource, DeclarationError>;

    /// Register `callback` for `source`.
    fn observe(&mut self, source: EventSource, callback: Callback);

    /// Current config values keyed by option name.
    fn config(&self) -> &Mapping;
}

/// In-memory runtime: records observers and replays emitted events to them.
#[derive(Default)]
pub struct EventRecorder {
    /// Scopes are per kind; a relation and a storage may share a name.
    scopes: AHashSet<(String, DeclarationKind)>,
    config: Mapping,
    observers: Vec<(EventSource, Callback)>,
}

impl EventRecorder {
    /// A recorder that knows every event scope declared by `class` and starts
    /// with the config defaults it declares.
    pub fn for_unit(class: &UnitClass) -> Result<Self, DeclarationError> {
        let collections = class.collections();
        let mut recorder = EventRecorder::default();

        for relation in collections.relations() {
            recorder.declare(relation.event_scope()?, DeclarationKind::Relation);
        }
        for storage in &collections.storage {
            recorder.declare(storage.event_scope()?, DeclarationKind::Storage);
        }
        for container in &collections.containers {
            recorder.declare(container.event_scope()?, DeclarationKind::Container);
        }
        for action in &collections.actions {
            recorder.declare(action.event_scope()?, DeclarationKind::Action);
        }

        for (name, option) in &collections.config {
            if let Some(default) = &option.spec().default {
                let value = serde_yaml::to_value(default).unwrap_or(Value::Null);
                recorder.config.insert(Value::from(name.as_str()), value);
            }
        }

        debug!(
            "Event recorder for {} knows {} scopes",
            class.ident(),
            recorder.scopes.len()
        );
        Ok(recorder)
    }

    /// Make `scope` known for events of `kind` declarations.
    pub fn declare(&mut self, scope: impl Into<String>, kind: DeclarationKind) {
        self.scopes.insert((scope.into(), kind));
    }

    /// Override a config value.
    pub fn with_config(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.config.insert(Value::from(key), value.into());
        self
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Deliver an event with no parameters.
    pub fn emit(&mut self, source: &EventSource) -> Event {
        self.emit_with_params(source, Mapping::new())
    }

    /// Deliver an event to every matching observer, in registration order.
    pub fn emit_with_params(&mut self, source: &EventSource, params: Mapping) -> Event {
        let mut event = Event::new(source.clone());
        event.params = params;

        let mut delivered = 0usize;
        for (observed, callback) in &mut self.observers {
            if observed == source {
                callback(&mut event);
                delivered += 1;
            }
        }
        trace!("Emitted {} to {} observers", source, delivered);
        event
    }
}

impl ObserverRuntime for EventRecorder {
    fn on(&self, scope: &str, kind: EventKind) -> Result<EventSource, DeclarationError> {
        let source = EventSource::scoped(scope, kind);
        match kind.scope_kind() {
            Some(expected) if self.scopes.contains(&(scope.to_string(), expected)) => Ok(source),
            _ => Err(DeclarationError::UnknownEventScope(source.path())),
        }
    }

    fn observe(&mut self, source: EventSource, callback: Callback) {
        trace!("Observing {}", source);
        self.observers.push((source, callback));
    }

    fn config(&self) -> &Mapping {
        &self.config
    }
}
