//! charmkit unit declarations and manifests
//!
//! This crate holds the declaration-to-manifest compiler used by the charmkit CLI:
//! - late-bound declaration primitives (relations, config, actions, storage,
//!   containers, resources)
//! - unit classes, whose definition runs the collector exactly once
//! - bound views that register callbacks with an observer runtime
//! - the serializer producing `metadata.yaml`, `actions.yaml`, `config.yaml`
//!   and `charmcraft.yaml`

pub mod collector;
pub mod declarations;
pub mod errors;
pub mod manifest_writer;
pub mod name;
pub mod runtime;
pub mod serializer;
pub mod unit;
pub mod views;

pub use collector::Collections;
pub use declarations::{
    action, config, container, float, integer, peer, provide, require, resource, storage, string,
    ActionSpec, ContainerSpec, Decl, Declaration, DeclarationKind, DeclarationSpec, Param,
    ParamType, ParamValue, RelationSpec, ResourceSpec, Role, StorageSpec,
};
pub use errors::{DeclarationError, ManifestError};
pub use manifest_writer::{read_from_path, write_to_dir};
pub use name::{event_scope, LateName};
pub use runtime::{Callback, Event, EventKind, EventRecorder, EventSource, ObserverRuntime};
pub use serializer::{
    ActionsManifest, Charmcraft, ConfigManifest, ManifestSet, Metadata, RelationEntry, Serializer,
};
pub use unit::{ActionCallback, Base, Bases, HandlerDecl, UnitClass, UnitClassBuilder};
pub use views::{ContainerView, RelationView, StorageView, Unit};
