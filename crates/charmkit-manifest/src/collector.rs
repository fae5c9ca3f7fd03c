//! Declaration collector
//!
//! Walks a linearized class hierarchy once, binds every declaration to the
//! attribute it is assigned to, routes it into its per-kind collection and
//! builds the action dispatch table. Attributes redefined by a more derived
//! class shadow the inherited ones; a declaration reachable through several
//! attributes or ancestors is collected once.

use ahash::{AHashMap, AHashSet};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::declarations::{
    ActionSpec, ContainerSpec, Decl, Declaration, DeclarationKind, Param, RelationSpec,
    ResourceSpec, Role, StorageSpec,
};
use crate::errors::DeclarationError;
use crate::name::event_scope;
use crate::unit::{HandlerDecl, UnitClass};

/// Per-kind collections of a unit class.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub actions: Vec<Arc<Declaration<ActionSpec>>>,
    pub config: BTreeMap<String, Arc<Declaration<Param>>>,
    pub provides: Vec<Arc<Declaration<RelationSpec>>>,
    pub requires: Vec<Arc<Declaration<RelationSpec>>>,
    pub peers: Vec<Arc<Declaration<RelationSpec>>>,
    pub storage: Vec<Arc<Declaration<StorageSpec>>>,
    pub containers: Vec<Arc<Declaration<ContainerSpec>>>,
    pub resources: Vec<Arc<Declaration<ResourceSpec>>>,
    /// Action name to the handler methods flagged for it.
    pub dispatch: BTreeMap<String, Vec<HandlerDecl>>,
}

impl Collections {
    /// All relations regardless of role.
    pub fn relations(&self) -> impl Iterator<Item = &Arc<Declaration<RelationSpec>>> {
        self.provides
            .iter()
            .chain(self.requires.iter())
            .chain(self.peers.iter())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
            + self.config.len()
            + self.provides.len()
            + self.requires.len()
            + self.peers.len()
            + self.storage.len()
            + self.containers.len()
            + self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Two collections are equal when they hold the very same declarations, in the
/// same order, and dispatch to the same methods.
impl PartialEq for Collections {
    fn eq(&self, other: &Self) -> bool {
        fn same<T>(a: &[Arc<T>], b: &[Arc<T>]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
        }

        let config_equal = self.config.len() == other.config.len()
            && self
                .config
                .iter()
                .zip(&other.config)
                .all(|((ka, a), (kb, b))| ka == kb && Arc::ptr_eq(a, b));

        let dispatch_equal = self.dispatch.len() == other.dispatch.len()
            && self
                .dispatch
                .iter()
                .zip(&other.dispatch)
                .all(|((ka, a), (kb, b))| {
                    ka == kb
                        && a.len() == b.len()
                        && a.iter().zip(b).all(|(x, y)| x.method == y.method)
                });

        same(&self.actions, &other.actions)
            && config_equal
            && same(&self.provides, &other.provides)
            && same(&self.requires, &other.requires)
            && same(&self.peers, &other.peers)
            && same(&self.storage, &other.storage)
            && same(&self.containers, &other.containers)
            && same(&self.resources, &other.resources)
            && dispatch_equal
    }
}

/// Run the collector over `mro` (most derived class first).
pub(crate) fn collect(mro: &[&UnitClass]) -> Result<Collections, DeclarationError> {
    let handlers = visible_handlers(mro);
    let mut collector = Collector::default();
    let mut shadowed: AHashSet<&str> = AHashSet::new();

    for class in mro {
        for (attr, decl) in class.own_attributes() {
            if !shadowed.insert(attr.as_str()) {
                trace!("{}.{} is shadowed by a derived class", class.ident(), attr);
                continue;
            }
            if decl.bind(attr) {
                trace!("Bound {} declaration to attribute {}", decl.kind(), attr);
            }
            collector.route(decl, &handlers)?;
        }
    }

    Ok(collector.collections)
}

/// Handler methods visible from the most derived class; a method redefined
/// lower in the hierarchy hides the inherited one.
fn visible_handlers<'a>(mro: &[&'a UnitClass]) -> Vec<&'a HandlerDecl> {
    let mut seen: AHashSet<&str> = AHashSet::new();
    let mut visible = Vec::new();
    for class in mro {
        for handler in class.own_handlers() {
            if seen.insert(handler.method.as_str()) {
                visible.push(handler);
            }
        }
    }
    visible
}

#[derive(Default)]
struct Collector {
    collections: Collections,
    /// Identities of declarations already routed.
    seen: AHashSet<usize>,
    /// Names claimed per kind; relations share one namespace across roles.
    names: AHashMap<DeclarationKind, AHashSet<String>>,
    /// Sanitized event scopes claimed per event-scoped kind.
    scopes: AHashMap<DeclarationKind, AHashSet<String>>,
}

impl Collector {
    fn route(&mut self, decl: &Decl, handlers: &[&HandlerDecl]) -> Result<(), DeclarationError> {
        if !self.seen.insert(decl.identity()) {
            trace!(
                "{} declaration {} already collected",
                decl.kind(),
                decl.name().unwrap_or_default()
            );
            return Ok(());
        }

        let name = decl.name()?.to_string();
        self.claim(decl.kind(), &name)?;

        match decl {
            Decl::Action(action) => {
                let flagged: Vec<HandlerDecl> = handlers
                    .iter()
                    .filter(|handler| Arc::ptr_eq(&handler.action, action))
                    .map(|handler| (*handler).clone())
                    .collect();
                for handler in &flagged {
                    debug!(
                        "Registered action handler for {}: {}",
                        name, handler.method
                    );
                }
                self.collections.dispatch.insert(name, flagged);
                self.collections.actions.push(Arc::clone(action));
            }
            Decl::Relation(relation) => {
                let target = match relation.role() {
                    Role::Provide => &mut self.collections.provides,
                    Role::Require => &mut self.collections.requires,
                    Role::Peer => &mut self.collections.peers,
                };
                debug!("Registered {}s({})", relation.role(), name);
                target.push(Arc::clone(relation));
            }
            Decl::Config(option) => {
                debug!("Registered config option {}", name);
                self.collections.config.insert(name, Arc::clone(option));
            }
            Decl::Storage(storage) => self.collections.storage.push(Arc::clone(storage)),
            Decl::Container(container) => {
                self.collections.containers.push(Arc::clone(container))
            }
            Decl::Resource(resource) => self.collections.resources.push(Arc::clone(resource)),
        }

        Ok(())
    }

    fn claim(&mut self, kind: DeclarationKind, name: &str) -> Result<(), DeclarationError> {
        let fresh = self.names.entry(kind).or_default().insert(name.to_string());
        let scoped = matches!(
            kind,
            DeclarationKind::Relation
                | DeclarationKind::Storage
                | DeclarationKind::Container
                | DeclarationKind::Action
        );
        let scope_free =
            !scoped || self.scopes.entry(kind).or_default().insert(event_scope(name));
        if fresh && scope_free {
            Ok(())
        } else {
            Err(DeclarationError::DuplicateDeclaration {
                kind,
                name: name.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::collector::*;
    use crate::declarations::*;

    #[test]
    fn test_each_class_gets_fresh_collections() {
        let parent = UnitClass::builder("Parent")
            .attr("db", require("interface"))
            .define()
            .unwrap();
        let child = UnitClass::builder("Child")
            .extends(&parent)
            .attr("web", provide("http"))
            .define()
            .unwrap();

        assert_eq!(parent.collections().requires.len(), 1);
        assert!(parent.collections().provides.is_empty());
        assert_eq!(child.collections().requires.len(), 1);
        assert_eq!(child.collections().provides.len(), 1);
        assert!(Arc::ptr_eq(
            &parent.collections().requires[0],
            &child.collections().requires[0]
        ));
    }

    #[test]
    fn test_attribute_name_binds_unnamed_declarations() {
        let class = UnitClass::builder("Named")
            .attr("default_name_obj", peer("interface"))
            .attr("custom_name_obj", peer("interface").named("peer-name"))
            .define()
            .unwrap();

        let names: Vec<&str> = class
            .collections()
            .peers
            .iter()
            .map(|p| p.name().unwrap())
            .collect();
        assert_eq!(names, vec!["default_name_obj", "peer-name"]);
    }

    #[test]
    fn test_shared_declaration_through_two_parents_is_collected_once() {
        let shared = Arc::new(require("pgsql"));
        let left = UnitClass::builder("Left")
            .attr("db", &shared)
            .define()
            .unwrap();
        let right = UnitClass::builder("Right")
            .attr("database", &shared)
            .define()
            .unwrap();
        let leaf = UnitClass::builder("Leaf")
            .extends(&left)
            .extends(&right)
            .define()
            .unwrap();

        assert_eq!(leaf.collections().requires.len(), 1);
        assert_eq!(leaf.collections().requires[0].name().unwrap(), "db");
    }

    #[test]
    fn test_collecting_again_is_idempotent() {
        let shared = Arc::new(config(string("shared option")));
        let base = UnitClass::builder("Base")
            .attr("shared", &shared)
            .attr("db", require("interface"))
            .define()
            .unwrap();
        let left = UnitClass::builder("Left")
            .extends(&base)
            .attr("cache", storage("filesystem"))
            .define()
            .unwrap();
        let right = UnitClass::builder("Right")
            .extends(&base)
            .attr("alias", &shared)
            .define()
            .unwrap();
        let leaf = UnitClass::builder("Leaf")
            .extends(&left)
            .extends(&right)
            .define()
            .unwrap();

        let again = leaf.collect().unwrap();
        assert_eq!(&again, leaf.collections());
        assert_eq!(leaf.collections().config.len(), 1);
        assert_eq!(leaf.collections().requires.len(), 1);
        assert_eq!(leaf.collections().storage.len(), 1);
    }

    #[test]
    fn test_derived_attribute_shadows_inherited_one() {
        let parent = UnitClass::builder("Parent")
            .attr("db", require("old-interface"))
            .define()
            .unwrap();
        let child = UnitClass::builder("Child")
            .extends(&parent)
            .attr("db", require("new-interface"))
            .define()
            .unwrap();

        let requires = &child.collections().requires;
        assert_eq!(requires.len(), 1);
        assert_eq!(requires[0].spec().interface, "new-interface");
    }

    #[test]
    fn test_distinct_declarations_with_same_name_collide() {
        let result = UnitClass::builder("Clash")
            .attr("one", require("a").named("db"))
            .attr("two", provide("b").named("db"))
            .define();

        assert_eq!(
            result.err(),
            Some(DeclarationError::DuplicateDeclaration {
                kind: DeclarationKind::Relation,
                name: "db".to_string(),
            })
        );
    }

    #[test]
    fn test_names_sharing_an_event_scope_are_duplicates() {
        let result = UnitClass::builder("Clash")
            .attr("a", peer("replicas").named("db-peers"))
            .attr("b", require("pgsql").named("db_peers"))
            .define();
        assert_eq!(
            result.err(),
            Some(DeclarationError::DuplicateDeclaration {
                kind: DeclarationKind::Relation,
                name: "db_peers".to_string(),
            })
        );

        let class = UnitClass::builder("Options")
            .attr("a", config(string("")).named("log-level"))
            .attr("b", config(string("")).named("log_level"))
            .define()
            .unwrap();
        assert_eq!(class.collections().config.len(), 2);
    }

    #[test]
    fn test_same_name_across_kinds_is_allowed() {
        let class = UnitClass::builder("Mixed")
            .attr("data", storage("filesystem"))
            .attr("data_cfg", config(string("")).named("data"))
            .define()
            .unwrap();
        assert_eq!(class.collections().len(), 2);
    }

    #[test]
    fn test_action_dispatch_table() {
        let get_data = Arc::new(action().param("foo", string("").with_default("2")));
        let log_me = Arc::new(action().named("log-me"));
        let class = UnitClass::builder("Dispatch")
            .attr("get_data", &get_data)
            .attr("log_me", &log_me)
            .flag_handler("_handle_get_data", &get_data)
            .define()
            .unwrap();

        let dispatch = &class.collections().dispatch;
        assert_eq!(dispatch["get_data"].len(), 1);
        assert_eq!(dispatch["get_data"][0].method, "_handle_get_data");
        assert!(dispatch["log-me"].is_empty());
    }

    #[test]
    fn test_inherited_handler_is_dispatched_for_inherited_action() {
        let get_data = Arc::new(action());
        let parent = UnitClass::builder("Parent")
            .attr("get_data", &get_data)
            .flag_handler("_handle", &get_data)
            .define()
            .unwrap();
        let child = UnitClass::builder("Child")
            .extends(&parent)
            .define()
            .unwrap();

        assert_eq!(child.collections().dispatch["get_data"].len(), 1);
    }
}
