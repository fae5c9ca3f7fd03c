//! Manifest serializer
//!
//! Reads the collections and static fields of a [`UnitClass`] and produces the
//! four manifest documents. Every document is a typed serde structure;
//! name-keyed maps are `BTreeMap`s so the rendered output is deterministic.
//! Serializing never mutates the class.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::declarations::{
    ActionSpec, ContainerSpec, Declaration, Param, RelationSpec, ResourceSpec, StorageSpec,
};
use crate::errors::DeclarationError;
use crate::unit::{Bases, UnitClass};

/// `metadata.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub subordinate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provides: BTreeMap<String, RelationEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requires: BTreeMap<String, RelationEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub peers: BTreeMap<String, RelationEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub containers: BTreeMap<String, ContainerSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, ResourceSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<String, StorageSpec>,
}

/// One relation endpoint in `metadata.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEntry {
    pub interface: String,
}

/// `actions.yaml`: action name to its parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionsManifest(pub BTreeMap<String, ActionSpec>);

/// `config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigManifest {
    #[serde(default)]
    pub options: BTreeMap<String, Param>,
}

/// `charmcraft.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charmcraft {
    #[serde(rename = "type")]
    pub kind: String,
    pub bases: Vec<Bases>,
}

/// The four documents of one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestSet {
    pub metadata: Metadata,
    pub actions: ActionsManifest,
    pub config: ConfigManifest,
    pub charmcraft: Charmcraft,
}

fn relation_entries(
    relations: &[Arc<Declaration<RelationSpec>>],
) -> Result<BTreeMap<String, RelationEntry>, DeclarationError> {
    relations
        .iter()
        .map(|relation| {
            let entry = RelationEntry {
                interface: relation.spec().interface.clone(),
            };
            Ok((relation.name()?.to_string(), entry))
        })
        .collect()
}

/// Renders a defined unit class into manifest documents.
pub struct Serializer<'a> {
    class: &'a UnitClass,
}

impl<'a> Serializer<'a> {
    pub fn new(class: &'a UnitClass) -> Self {
        Serializer { class }
    }

    pub fn metadata(&self) -> Result<Metadata, DeclarationError> {
        let class = self.class;
        let collections = class.collections();
        let name = class
            .unit_name()
            .ok_or_else(|| DeclarationError::MissingUnitName(class.ident().to_string()))?;

        let mut containers = BTreeMap::new();
        for container in &collections.containers {
            containers.insert(container.name()?.to_string(), container.spec().clone());
        }
        let mut resources = BTreeMap::new();
        for resource in &collections.resources {
            resources.insert(resource.name()?.to_string(), resource.spec().clone());
        }
        let mut storage = BTreeMap::new();
        for mount in &collections.storage {
            storage.insert(mount.name()?.to_string(), mount.spec().clone());
        }

        Ok(Metadata {
            name: name.to_string(),
            subordinate: class.subordinate(),
            description: class.description().map(str::to_string),
            summary: class.summary().map(str::to_string),
            maintainer: class.maintainer().map(str::to_string),
            provides: relation_entries(&collections.provides)?,
            requires: relation_entries(&collections.requires)?,
            peers: relation_entries(&collections.peers)?,
            containers,
            resources,
            storage,
        })
    }

    pub fn actions(&self) -> Result<ActionsManifest, DeclarationError> {
        let mut actions = BTreeMap::new();
        for action in &self.class.collections().actions {
            actions.insert(action.name()?.to_string(), action.spec().clone());
        }
        Ok(ActionsManifest(actions))
    }

    pub fn config(&self) -> ConfigManifest {
        let options = self
            .class
            .collections()
            .config
            .iter()
            .map(|(name, option)| (name.clone(), option.spec().clone()))
            .collect();
        ConfigManifest { options }
    }

    pub fn charmcraft(&self) -> Charmcraft {
        Charmcraft {
            kind: "charm".to_string(),
            bases: self.class.bases(),
        }
    }

    pub fn manifests(&self) -> Result<ManifestSet, DeclarationError> {
        let set = ManifestSet {
            metadata: self.metadata()?,
            actions: self.actions()?,
            config: self.config(),
            charmcraft: self.charmcraft(),
        };
        debug!(
            "Serialized {}: {} actions, {} config options",
            set.metadata.name,
            set.actions.0.len(),
            set.config.options.len()
        );
        Ok(set)
    }
}
