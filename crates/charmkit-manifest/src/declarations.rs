//! Declaration primitives
//!
//! Every declaration pairs a [`LateName`] with a kind-specific spec. The specs
//! double as the manifest entries they serialize to, so field names here are
//! the contract strings the orchestration runtime parses (`type`,
//! `description`, `default`, `location`, `resource`, `upstream-source`).
//!
//! Declarations are shared as `Arc<Declaration<S>>`; two handles are "the
//! same declaration" exactly when they point at the same allocation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::DeclarationError;
use crate::name::{event_scope, LateName};

// =============================================================================
// KINDS
// =============================================================================

/// Discriminant of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclarationKind {
    Relation,
    Config,
    Action,
    Storage,
    Container,
    Resource,
}

impl DeclarationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeclarationKind::Relation => "relation",
            DeclarationKind::Config => "config",
            DeclarationKind::Action => "action",
            DeclarationKind::Storage => "storage",
            DeclarationKind::Container => "container",
            DeclarationKind::Resource => "resource",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Require,
    Provide,
    Peer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Require => "require",
            Role::Provide => "provide",
            Role::Peer => "peer",
        })
    }
}

// =============================================================================
// SPECS
// =============================================================================

/// Implemented by every kind-specific spec so declarations can be wrapped into
/// and recovered from the tagged [`Decl`] variant.
pub trait DeclarationSpec: fmt::Debug + Send + Sync + Sized + 'static {
    const KIND: DeclarationKind;

    fn wrap(declaration: Arc<Declaration<Self>>) -> Decl;

    fn project(decl: &Decl) -> Option<&Arc<Declaration<Self>>>;
}

/// A relation endpoint: interface name and role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub role: Role,
    pub interface: String,
}

/// Parameter types understood by config options and action parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
}

/// A literal default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Float(f64),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Integer(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

/// Schema of a config option or an action parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
}

impl Param {
    pub fn new(param_type: ParamType, description: impl Into<String>) -> Self {
        Param {
            param_type,
            description: description.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A string parameter.
pub fn string(description: impl Into<String>) -> Param {
    Param::new(ParamType::String, description)
}

/// An integer parameter.
pub fn integer(description: impl Into<String>) -> Param {
    Param::new(ParamType::Integer, description)
}

/// A float parameter.
pub fn float(description: impl Into<String>) -> Param {
    Param::new(ParamType::Float, description)
}

/// Parameters (and optional description) of an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, Param>,
}

/// Filesystem storage mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSpec {
    #[serde(rename = "type")]
    pub storage_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Workload container, referencing the resource that provides its image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub resource: String,
}

/// Unit resource, an OCI image unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "upstream-source",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub upstream_source: Option<String>,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        ResourceSpec {
            resource_type: "oci-image".to_string(),
            description: None,
            upstream_source: None,
        }
    }
}

macro_rules! declaration_spec {
    ($spec:ty, $variant:ident) => {
        impl DeclarationSpec for $spec {
            const KIND: DeclarationKind = DeclarationKind::$variant;

            fn wrap(declaration: Arc<Declaration<Self>>) -> Decl {
                Decl::$variant(declaration)
            }

            fn project(decl: &Decl) -> Option<&Arc<Declaration<Self>>> {
                match decl {
                    Decl::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

declaration_spec!(RelationSpec, Relation);
declaration_spec!(Param, Config);
declaration_spec!(ActionSpec, Action);
declaration_spec!(StorageSpec, Storage);
declaration_spec!(ContainerSpec, Container);
declaration_spec!(ResourceSpec, Resource);

// =============================================================================
// DECLARATION
// =============================================================================

/// A class-level declaration with a late-bound name.
#[derive(Debug)]
pub struct Declaration<S> {
    name: LateName,
    spec: S,
}

impl<S: DeclarationSpec> Declaration<S> {
    pub fn new(spec: S) -> Self {
        Declaration {
            name: LateName::unbound(),
            spec,
        }
    }

    /// Supply the name explicitly; it takes precedence over the attribute name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = LateName::bound(name);
        self
    }

    pub fn kind(&self) -> DeclarationKind {
        S::KIND
    }

    pub fn name(&self) -> Result<&str, DeclarationError> {
        self.name
            .get()
            .ok_or(DeclarationError::UnboundName { kind: S::KIND })
    }

    pub fn is_bound(&self) -> bool {
        self.name.is_bound()
    }

    /// Resolve the name unless already resolved. Returns `true` if this call bound it.
    pub fn bind(&self, candidate: &str) -> bool {
        self.name.bind(candidate)
    }

    /// The hyphen-free name used to scope runtime events.
    pub fn event_scope(&self) -> Result<String, DeclarationError> {
        self.name().map(event_scope)
    }

    pub fn spec(&self) -> &S {
        &self.spec
    }
}

impl Declaration<RelationSpec> {
    pub fn role(&self) -> Role {
        self.spec.role
    }
}

impl Declaration<ActionSpec> {
    pub fn param(mut self, name: impl Into<String>, param: Param) -> Self {
        self.spec.params.insert(name.into(), param);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.spec.description = Some(description.into());
        self
    }
}

impl Declaration<StorageSpec> {
    /// Mount location inside the workload.
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.spec.location = Some(location.into());
        self
    }
}

impl Declaration<ResourceSpec> {
    pub fn of_type(mut self, resource_type: impl Into<String>) -> Self {
        self.spec.resource_type = resource_type.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.spec.description = Some(description.into());
        self
    }

    pub fn with_upstream_source(mut self, source: impl Into<String>) -> Self {
        self.spec.upstream_source = Some(source.into());
        self
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

pub fn relation(interface: impl Into<String>, role: Role) -> Declaration<RelationSpec> {
    Declaration::new(RelationSpec {
        role,
        interface: interface.into(),
    })
}

pub fn require(interface: impl Into<String>) -> Declaration<RelationSpec> {
    relation(interface, Role::Require)
}

pub fn provide(interface: impl Into<String>) -> Declaration<RelationSpec> {
    relation(interface, Role::Provide)
}

pub fn peer(interface: impl Into<String>) -> Declaration<RelationSpec> {
    relation(interface, Role::Peer)
}

pub fn config(param: Param) -> Declaration<Param> {
    Declaration::new(param)
}

/// An action without parameters; add them with [`Declaration::param`].
pub fn action() -> Declaration<ActionSpec> {
    Declaration::new(ActionSpec::default())
}

pub fn storage(storage_type: impl Into<String>) -> Declaration<StorageSpec> {
    Declaration::new(StorageSpec {
        storage_type: storage_type.into(),
        location: None,
    })
}

pub fn container(resource: impl Into<String>) -> Declaration<ContainerSpec> {
    Declaration::new(ContainerSpec {
        resource: resource.into(),
    })
}

pub fn resource() -> Declaration<ResourceSpec> {
    Declaration::new(ResourceSpec::default())
}

// =============================================================================
// TAGGED VARIANT
// =============================================================================

/// Any declaration, as stored in a unit class attribute.
#[derive(Debug, Clone)]
pub enum Decl {
    Relation(Arc<Declaration<RelationSpec>>),
    Config(Arc<Declaration<Param>>),
    Action(Arc<Declaration<ActionSpec>>),
    Storage(Arc<Declaration<StorageSpec>>),
    Container(Arc<Declaration<ContainerSpec>>),
    Resource(Arc<Declaration<ResourceSpec>>),
}

impl Decl {
    pub fn kind(&self) -> DeclarationKind {
        match self {
            Decl::Relation(_) => DeclarationKind::Relation,
            Decl::Config(_) => DeclarationKind::Config,
            Decl::Action(_) => DeclarationKind::Action,
            Decl::Storage(_) => DeclarationKind::Storage,
            Decl::Container(_) => DeclarationKind::Container,
            Decl::Resource(_) => DeclarationKind::Resource,
        }
    }

    pub fn name(&self) -> Result<&str, DeclarationError> {
        match self {
            Decl::Relation(d) => d.name(),
            Decl::Config(d) => d.name(),
            Decl::Action(d) => d.name(),
            Decl::Storage(d) => d.name(),
            Decl::Container(d) => d.name(),
            Decl::Resource(d) => d.name(),
        }
    }

    pub fn bind(&self, candidate: &str) -> bool {
        match self {
            Decl::Relation(d) => d.bind(candidate),
            Decl::Config(d) => d.bind(candidate),
            Decl::Action(d) => d.bind(candidate),
            Decl::Storage(d) => d.bind(candidate),
            Decl::Container(d) => d.bind(candidate),
            Decl::Resource(d) => d.bind(candidate),
        }
    }

    /// Address of the shared declaration, used for identity comparisons.
    pub(crate) fn identity(&self) -> usize {
        match self {
            Decl::Relation(d) => Arc::as_ptr(d) as usize,
            Decl::Config(d) => Arc::as_ptr(d) as usize,
            Decl::Action(d) => Arc::as_ptr(d) as usize,
            Decl::Storage(d) => Arc::as_ptr(d) as usize,
            Decl::Container(d) => Arc::as_ptr(d) as usize,
            Decl::Resource(d) => Arc::as_ptr(d) as usize,
        }
    }
}

impl<S: DeclarationSpec> From<Declaration<S>> for Decl {
    fn from(declaration: Declaration<S>) -> Self {
        S::wrap(Arc::new(declaration))
    }
}

impl<S: DeclarationSpec> From<Arc<Declaration<S>>> for Decl {
    fn from(declaration: Arc<Declaration<S>>) -> Self {
        S::wrap(declaration)
    }
}

impl<S: DeclarationSpec> From<&Arc<Declaration<S>>> for Decl {
    fn from(declaration: &Arc<Declaration<S>>) -> Self {
        S::wrap(Arc::clone(declaration))
    }
}

#[cfg(test)]
mod tests {
    use crate::declarations::*;

    #[test]
    fn test_unbound_declarations_fail_on_name() {
        let unbound: Vec<Decl> = vec![
            config(string("")).into(),
            action().into(),
            storage("filesystem").into(),
            peer("interface").into(),
            require("interface").into(),
            provide("interface").into(),
            container("image").into(),
            resource().into(),
        ];

        for decl in unbound {
            assert_eq!(
                decl.name(),
                Err(DeclarationError::UnboundName { kind: decl.kind() })
            );
        }
    }

    #[test]
    fn test_named_declarations_resolve() {
        let bound: Vec<Decl> = vec![
            config(string("")).named("foo").into(),
            action().named("foo").into(),
            storage("filesystem").named("foo").into(),
            peer("interface").named("foo").into(),
            require("interface").named("foo").into(),
            provide("interface").named("foo").into(),
            container("image").named("foo").into(),
            resource().named("foo").into(),
        ];

        for decl in bound {
            assert_eq!(decl.name(), Ok("foo"));
        }
    }

    #[test]
    fn test_bind_then_rebind_keeps_first() {
        let db = require("interface");
        assert!(db.bind("x"));
        assert_eq!(db.name(), Ok("x"));
        assert!(!db.bind("y"));
        assert_eq!(db.name(), Ok("x"));
    }

    #[test]
    fn test_event_scope_is_sanitized() {
        let peers = peer("db-replicas").named("db-peers");
        assert_eq!(peers.name(), Ok("db-peers"));
        assert_eq!(peers.event_scope(), Ok("db_peers".to_string()));
    }

    #[test]
    fn test_identity_follows_the_shared_allocation() {
        let shared = Arc::new(require("interface"));
        let a = Decl::from(&shared);
        let b = Decl::from(Arc::clone(&shared));
        let other = Decl::from(require("interface"));
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), other.identity());
    }

    #[test]
    fn test_param_default_serializes_with_contract_keys() {
        let param = string("my description").with_default("foo");
        let value = serde_yaml::to_value(&param).unwrap();
        let expected: serde_yaml::Value =
            serde_yaml::from_str("{type: string, description: my description, default: foo}")
                .unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn test_param_without_default_omits_it() {
        let value = serde_yaml::to_value(integer("")).unwrap();
        let expected: serde_yaml::Value =
            serde_yaml::from_str("{type: integer, description: ''}").unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn test_resource_omits_empty_fields() {
        let plain = resource();
        let value = serde_yaml::to_value(plain.spec()).unwrap();
        let expected: serde_yaml::Value = serde_yaml::from_str("{type: oci-image}").unwrap();
        assert_eq!(value, expected);

        let full = resource()
            .with_description("workload image")
            .with_upstream_source("ghcr.io/example/app:1.0");
        let value = serde_yaml::to_value(full.spec()).unwrap();
        let expected: serde_yaml::Value = serde_yaml::from_str(
            "{type: oci-image, description: workload image, upstream-source: 'ghcr.io/example/app:1.0'}",
        )
        .unwrap();
        assert_eq!(value, expected);
    }
}
