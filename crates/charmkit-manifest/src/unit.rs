//! Unit classes
//!
//! A [`UnitClass`] is the class-level description of a deployable unit: its
//! static fields, its own declaration attributes, the action handlers its
//! methods are flagged with, and its parent classes. Defining a class through
//! [`UnitClassBuilder::define`] is the one-shot hook that runs the collector;
//! the resulting class is immutable.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::collector::{self, Collections};
use crate::declarations::{ActionSpec, Decl, Declaration, DeclarationSpec};
use crate::errors::DeclarationError;
use crate::runtime::Event;

// =============================================================================
// BASES
// =============================================================================

/// A platform the unit builds or runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    pub name: String,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,
}

impl Base {
    pub fn new(name: impl Into<String>, channel: impl Into<String>) -> Self {
        Base {
            name: name.into(),
            channel: channel.into(),
            architectures: Vec::new(),
        }
    }

    pub fn ubuntu(channel: impl Into<String>) -> Self {
        Base::new("ubuntu", channel)
    }

    pub fn with_architectures<I, S>(mut self, architectures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.architectures = architectures.into_iter().map(Into::into).collect();
        self
    }
}

/// One `bases` entry of the build descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bases {
    #[serde(rename = "run-on")]
    pub run_on: SmallVec<[Base; 1]>,
    #[serde(rename = "build-on")]
    pub build_on: SmallVec<[Base; 1]>,
}

impl Bases {
    pub fn new(
        run_on: impl IntoIterator<Item = Base>,
        build_on: impl IntoIterator<Item = Base>,
    ) -> Self {
        Bases {
            run_on: run_on.into_iter().collect(),
            build_on: build_on.into_iter().collect(),
        }
    }
}

impl Default for Bases {
    fn default() -> Self {
        Bases::new([Base::ubuntu("focal")], [Base::ubuntu("focal")])
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Action handler body. Returning a map records it as the action's results.
pub type ActionCallback = Arc<dyn Fn(&Event) -> Option<serde_yaml::Mapping> + Send + Sync>;

/// A method flagged as the handler of an action.
#[derive(Clone)]
pub struct HandlerDecl {
    pub method: String,
    pub action: Arc<Declaration<ActionSpec>>,
    pub callback: Option<ActionCallback>,
}

impl fmt::Debug for HandlerDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDecl")
            .field("method", &self.method)
            .field("action", &self.action.name().unwrap_or("<unbound>"))
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

// =============================================================================
// STATIC FIELDS
// =============================================================================

#[derive(Debug, Clone, Default)]
struct UnitStatics {
    name: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    maintainer: Option<String>,
    subordinate: Option<bool>,
    bases: Option<Vec<Bases>>,
}

impl UnitStatics {
    /// Fill every unset field from `parent`.
    fn inherit(&mut self, parent: &UnitStatics) {
        fn fill<T: Clone>(slot: &mut Option<T>, from: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(from);
            }
        }
        fill(&mut self.name, &parent.name);
        fill(&mut self.summary, &parent.summary);
        fill(&mut self.description, &parent.description);
        fill(&mut self.maintainer, &parent.maintainer);
        fill(&mut self.subordinate, &parent.subordinate);
        fill(&mut self.bases, &parent.bases);
    }
}

// =============================================================================
// UNIT CLASS
// =============================================================================

/// Class-level description of a unit, with its collected declarations.
#[derive(Debug)]
pub struct UnitClass {
    ident: String,
    parents: Vec<Arc<UnitClass>>,
    /// Linearized ancestors, most derived first, excluding this class.
    ancestors: Vec<Arc<UnitClass>>,
    attrs: Vec<(String, Decl)>,
    handlers: Vec<HandlerDecl>,
    statics: UnitStatics,
    resolved: UnitStatics,
    collections: Collections,
}

impl UnitClass {
    pub fn builder(ident: impl Into<String>) -> UnitClassBuilder {
        UnitClassBuilder {
            ident: ident.into(),
            parents: Vec::new(),
            attrs: Vec::new(),
            handlers: Vec::new(),
            statics: UnitStatics::default(),
        }
    }

    /// Class identifier (e.g. `MyCharm`), not the unit name.
    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn parents(&self) -> &[Arc<UnitClass>] {
        &self.parents
    }

    /// This class followed by its linearized ancestors.
    pub fn mro(&self) -> impl Iterator<Item = &UnitClass> {
        std::iter::once(self).chain(self.ancestors.iter().map(|class| class.as_ref()))
    }

    /// Declaration attributes defined on this class itself.
    pub fn own_attributes(&self) -> &[(String, Decl)] {
        &self.attrs
    }

    /// Handler methods defined on this class itself.
    pub fn own_handlers(&self) -> &[HandlerDecl] {
        &self.handlers
    }

    /// Resolve a class attribute through the hierarchy.
    pub fn attribute(&self, attr: &str) -> Option<&Decl> {
        self.mro().find_map(|class| {
            class
                .attrs
                .iter()
                .find(|(name, _)| name == attr)
                .map(|(_, decl)| decl)
        })
    }

    /// Resolve a class attribute and check its kind.
    pub fn declaration<S: DeclarationSpec>(
        &self,
        attr: &str,
    ) -> Result<Arc<Declaration<S>>, DeclarationError> {
        let decl = self
            .attribute(attr)
            .ok_or_else(|| DeclarationError::UnknownAttribute {
                class: self.ident.clone(),
                attr: attr.to_string(),
            })?;
        S::project(decl)
            .cloned()
            .ok_or_else(|| DeclarationError::KindMismatch {
                attr: attr.to_string(),
                expected: S::KIND,
                found: decl.kind(),
            })
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Re-run the collector over the current hierarchy.
    ///
    /// Definition already did this once; the result of any later run is
    /// identical because binding and deduplication are idempotent.
    pub fn collect(&self) -> Result<Collections, DeclarationError> {
        let mro: Vec<&UnitClass> = self.mro().collect();
        collector::collect(&mro)
    }

    pub fn unit_name(&self) -> Option<&str> {
        self.resolved.name.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.resolved.summary.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.resolved.description.as_deref()
    }

    pub fn maintainer(&self) -> Option<&str> {
        self.resolved.maintainer.as_deref()
    }

    pub fn subordinate(&self) -> bool {
        self.resolved.subordinate.unwrap_or(false)
    }

    pub fn bases(&self) -> Vec<Bases> {
        self.resolved
            .bases
            .clone()
            .unwrap_or_else(|| vec![Bases::default()])
    }
}

/// Collects a unit class definition; [`define`](UnitClassBuilder::define)
/// finalizes it.
#[must_use]
pub struct UnitClassBuilder {
    ident: String,
    parents: Vec<Arc<UnitClass>>,
    attrs: Vec<(String, Decl)>,
    handlers: Vec<HandlerDecl>,
    statics: UnitStatics,
}

impl UnitClassBuilder {
    pub fn extends(mut self, parent: &Arc<UnitClass>) -> Self {
        self.parents.push(Arc::clone(parent));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.statics.name = Some(name.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.statics.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.statics.description = Some(description.into());
        self
    }

    pub fn maintainer(mut self, maintainer: impl Into<String>) -> Self {
        self.statics.maintainer = Some(maintainer.into());
        self
    }

    pub fn subordinate(mut self, subordinate: bool) -> Self {
        self.statics.subordinate = Some(subordinate);
        self
    }

    pub fn bases(mut self, bases: Vec<Bases>) -> Self {
        self.statics.bases = Some(bases);
        self
    }

    /// Assign a declaration to a class attribute. Re-assigning an attribute
    /// replaces the earlier value, as a class body would.
    pub fn attr(mut self, attr: impl Into<String>, decl: impl Into<Decl>) -> Self {
        let attr = attr.into();
        let decl = decl.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(name, _)| *name == attr) {
            slot.1 = decl;
        } else {
            self.attrs.push((attr, decl));
        }
        self
    }

    /// Flag `method` as the handler of `action`, with a callback to run.
    pub fn handler<F>(
        mut self,
        method: impl Into<String>,
        action: &Arc<Declaration<ActionSpec>>,
        callback: F,
    ) -> Self
    where
        F: Fn(&Event) -> Option<serde_yaml::Mapping> + Send + Sync + 'static,
    {
        self.handlers.push(HandlerDecl {
            method: method.into(),
            action: Arc::clone(action),
            callback: Some(Arc::new(callback)),
        });
        self
    }

    /// Flag `method` as the handler of `action` without a body, as recovered
    /// from source that is not executed.
    pub fn flag_handler(
        mut self,
        method: impl Into<String>,
        action: &Arc<Declaration<ActionSpec>>,
    ) -> Self {
        self.handlers.push(HandlerDecl {
            method: method.into(),
            action: Arc::clone(action),
            callback: None,
        });
        self
    }

    /// Define the class: linearize its hierarchy, resolve inherited static
    /// fields and run the collector once.
    pub fn define(self) -> Result<Arc<UnitClass>, DeclarationError> {
        let ancestors = linearize(&self.ident, &self.parents)?;

        let mut resolved = self.statics.clone();
        for ancestor in &ancestors {
            resolved.inherit(&ancestor.statics);
        }

        let mut class = UnitClass {
            ident: self.ident,
            parents: self.parents,
            ancestors,
            attrs: self.attrs,
            handlers: self.handlers,
            statics: self.statics,
            resolved,
            collections: Collections::default(),
        };
        class.collections = class.collect()?;

        debug!(
            "Defined unit class {} ({} ancestors, {} actions, {} config options)",
            class.ident,
            class.ancestors.len(),
            class.collections.actions.len(),
            class.collections.config.len()
        );

        Ok(Arc::new(class))
    }
}

/// C3 linearization of `parents`, most derived first.
fn linearize(
    ident: &str,
    parents: &[Arc<UnitClass>],
) -> Result<Vec<Arc<UnitClass>>, DeclarationError> {
    let mut sequences: Vec<Vec<Arc<UnitClass>>> = parents
        .iter()
        .map(|parent| {
            let mut sequence = vec![Arc::clone(parent)];
            sequence.extend(parent.ancestors.iter().cloned());
            sequence
        })
        .collect();
    sequences.push(parents.to_vec());

    let mut linearized: Vec<Arc<UnitClass>> = Vec::new();
    loop {
        sequences.retain(|sequence| !sequence.is_empty());
        if sequences.is_empty() {
            return Ok(linearized);
        }

        let head = sequences
            .iter()
            .map(|sequence| &sequence[0])
            .find(|candidate| {
                !sequences.iter().any(|sequence| {
                    sequence[1..]
                        .iter()
                        .any(|class| Arc::ptr_eq(class, candidate))
                })
            })
            .cloned()
            .ok_or_else(|| DeclarationError::InconsistentHierarchy(ident.to_string()))?;

        for sequence in &mut sequences {
            if Arc::ptr_eq(&sequence[0], &head) {
                sequence.remove(0);
            }
        }
        linearized.push(head);
    }
}
