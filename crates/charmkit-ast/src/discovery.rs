//! Discovery of the unit class defined in a Python charm source
//!
//! The source is parsed, never executed. Discovery finds the single concrete
//! subclass of the unit base type and rebuilds it, and every unit class it
//! extends in the same file, through [`UnitClass::builder`]. Defining the
//! rebuilt classes runs the collector exactly as for classes declared in Rust.

use ast_grep_core::AstGrep;
use ast_grep_language::Python;
use charmkit_logger as logger;
use charmkit_manifest::{
    ActionSpec, Base, Bases, Decl, Declaration, DeclarationError, UnitClass, UnitClassBuilder,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::declarations::{declaration_from_call, is_declaration_call};
use crate::errors::DiscoveryError;
use crate::naming::camel_to_kebab;
use crate::source::{evaluate, named_children, PyCall, PyNode, PyValue};

/// Where the unit base type comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub base_class: String,
    pub base_module: String,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        DiscoveryOptions {
            base_class: "Unit".to_string(),
            base_module: "charmkit".to_string(),
        }
    }
}

/// Discover and define the unit class in the file at `path`.
pub fn discover_unit(
    path: &Path,
    options: &DiscoveryOptions,
) -> Result<Arc<UnitClass>, DiscoveryError> {
    UnitDiscovery::from_path(path, options.clone())?.discover()
}

/// A module-level class as written in the source.
struct ClassSource<'r> {
    name: String,
    bases: Vec<String>,
    body: Option<PyNode<'r>>,
}

pub struct UnitDiscovery {
    path: PathBuf,
    source: String,
    options: DiscoveryOptions,
}

impl UnitDiscovery {
    pub fn from_path(path: &Path, options: DiscoveryOptions) -> Result<Self, DiscoveryError> {
        let source = fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_source(path, source, options))
    }

    /// Discover from in-memory source; `path` is only used in messages.
    pub fn from_source(
        path: impl Into<PathBuf>,
        source: impl Into<String>,
        options: DiscoveryOptions,
    ) -> Self {
        UnitDiscovery {
            path: path.into(),
            source: source.into(),
            options,
        }
    }

    pub fn discover(&self) -> Result<Arc<UnitClass>, DiscoveryError> {
        let sg = AstGrep::new(self.source.as_str(), Python);
        let root = sg.root();

        let classes = module_classes(&root);
        let mut base_refs = HashSet::new();
        collect_base_refs(&root, &self.options, &mut base_refs);
        if classes.iter().any(|class| class.name == self.options.base_class) {
            base_refs.insert(self.options.base_class.clone());
        }
        if base_refs.is_empty() {
            return Err(DiscoveryError::MissingUnitType {
                base: self.options.base_class.clone(),
                path: self.path.clone(),
            });
        }

        let units = unit_classes(&classes, &base_refs);
        let concrete: BTreeSet<&str> = units
            .iter()
            .filter(|name| {
                !classes
                    .iter()
                    .any(|class| units.contains(&class.name) && class.bases.contains(*name))
            })
            .map(String::as_str)
            .collect();

        logger::debug(&format!(
            "{}: {} classes, {} unit classes, concrete: {:?}",
            self.path.display(),
            classes.len(),
            units.len(),
            concrete
        ));

        let unit = match concrete.len() {
            0 => {
                return Err(DiscoveryError::NoUnitSubclass {
                    base: self.options.base_class.clone(),
                    path: self.path.clone(),
                })
            }
            1 => concrete.first().copied().unwrap_or_default(),
            _ => {
                return Err(DiscoveryError::MultipleUnitSubclasses {
                    path: self.path.clone(),
                    classes: concrete.iter().map(|name| (*name).to_string()).collect(),
                })
            }
        };

        let mut builder = ClassBuilder {
            classes: &classes,
            units: &units,
            built: HashMap::new(),
            in_progress: HashSet::new(),
        };
        builder.build(unit, true)
    }
}

/// Classes defined at module level, in definition order. A later definition
/// of the same name replaces the earlier one.
fn module_classes<'r>(root: &PyNode<'r>) -> Vec<ClassSource<'r>> {
    let mut classes: Vec<ClassSource<'r>> = Vec::new();
    for statement in named_children(root) {
        let definition = match &*statement.kind() {
            "class_definition" => Some(statement.clone()),
            "decorated_definition" => statement
                .field("definition")
                .filter(|def| def.kind() == "class_definition"),
            _ => None,
        };
        let Some(definition) = definition else {
            continue;
        };
        let Some(name) = definition.field("name").map(|n| n.text().to_string()) else {
            continue;
        };
        let bases = definition
            .field("superclasses")
            .map(|list| {
                named_children(&list)
                    .into_iter()
                    .filter(|base| base.kind() != "keyword_argument")
                    .map(|base| base.text().to_string())
                    .collect()
            })
            .unwrap_or_default();
        let class = ClassSource {
            name,
            bases,
            body: definition.field("body"),
        };
        classes.retain(|existing| existing.name != class.name);
        classes.push(class);
    }
    classes
}

/// Record every expression that names the unit base type through an import.
/// Imports nested in `if`/`try` blocks count; class and function bodies do not.
fn collect_base_refs(node: &PyNode<'_>, options: &DiscoveryOptions, refs: &mut HashSet<String>) {
    for child in named_children(node) {
        match &*child.kind() {
            "import_from_statement" => {
                let mut parts = named_children(&child).into_iter();
                let Some(module) = parts.next() else {
                    continue;
                };
                if module.text() != options.base_module.as_str() {
                    continue;
                }
                for imported in parts {
                    match &*imported.kind() {
                        "wildcard_import" => {
                            refs.insert(options.base_class.clone());
                        }
                        "dotted_name" if imported.text() == options.base_class.as_str() => {
                            refs.insert(options.base_class.clone());
                        }
                        "aliased_import" => {
                            let name = imported.field("name").map(|n| n.text().to_string());
                            let alias = imported.field("alias").map(|n| n.text().to_string());
                            if let (Some(name), Some(alias)) = (name, alias) {
                                if name == options.base_class {
                                    refs.insert(alias);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            "import_statement" => {
                for imported in named_children(&child) {
                    match &*imported.kind() {
                        "dotted_name" if imported.text() == options.base_module.as_str() => {
                            refs.insert(format!("{}.{}", options.base_module, options.base_class));
                        }
                        "aliased_import" => {
                            let name = imported.field("name").map(|n| n.text().to_string());
                            let alias = imported.field("alias").map(|n| n.text().to_string());
                            if let (Some(name), Some(alias)) = (name, alias) {
                                if name == options.base_module {
                                    refs.insert(format!("{}.{}", alias, options.base_class));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            "class_definition" | "function_definition" | "decorated_definition" => {}
            _ => collect_base_refs(&child, options, refs),
        }
    }
}

/// Names of all classes deriving from the base type, directly or through
/// other classes in the file.
fn unit_classes(classes: &[ClassSource<'_>], base_refs: &HashSet<String>) -> HashSet<String> {
    let mut units: HashSet<String> = HashSet::new();
    loop {
        let before = units.len();
        for class in classes {
            // the base type itself, when defined locally
            if base_refs.contains(&class.name) {
                continue;
            }
            if class
                .bases
                .iter()
                .any(|base| base_refs.contains(base) || units.contains(base))
            {
                units.insert(class.name.clone());
            }
        }
        if units.len() == before {
            return units;
        }
    }
}

// =============================================================================
// CLASS BUILDING
// =============================================================================

const STATIC_FIELDS: &[&str] = &[
    "name",
    "summary",
    "description",
    "maintainer",
    "subordinate",
    "bases",
];

struct ClassBuilder<'a, 'r> {
    classes: &'a [ClassSource<'r>],
    units: &'a HashSet<String>,
    built: HashMap<String, Arc<UnitClass>>,
    in_progress: HashSet<String>,
}

impl ClassBuilder<'_, '_> {
    fn build(&mut self, name: &str, concrete: bool) -> Result<Arc<UnitClass>, DiscoveryError> {
        if let Some(class) = self.built.get(name) {
            return Ok(Arc::clone(class));
        }
        if !self.in_progress.insert(name.to_string()) {
            return Err(DeclarationError::InconsistentHierarchy(name.to_string()).into());
        }

        let classes = self.classes;
        let Some(source) = classes.iter().find(|class| class.name == name) else {
            return Err(DeclarationError::InconsistentHierarchy(name.to_string()).into());
        };

        let mut parents = Vec::new();
        for base in &source.bases {
            if self.units.contains(base) {
                parents.push(self.build(base, false)?);
            }
        }

        let mut builder = UnitClass::builder(name);
        for parent in &parents {
            builder = builder.extends(parent);
        }

        let mut actions: HashMap<String, Arc<Declaration<ActionSpec>>> = HashMap::new();
        let mut has_name = false;
        if let Some(body) = &source.body {
            for statement in named_children(body) {
                match &*statement.kind() {
                    "expression_statement" => {
                        let Some((attr, value)) = class_assignment(&statement) else {
                            continue;
                        };
                        match value {
                            PyValue::Call(call) if is_declaration_call(&call) => {
                                let decl = declaration_from_call(&call)
                                    .map_err(|reason| unsupported(name, &attr, reason))?;
                                if let Decl::Action(action) = &decl {
                                    actions.insert(attr.clone(), Arc::clone(action));
                                } else {
                                    actions.remove(&attr);
                                }
                                builder = builder.attr(attr, decl);
                            }
                            value if STATIC_FIELDS.contains(&attr.as_str()) => {
                                has_name |= attr == "name" && value != PyValue::None;
                                builder = apply_static(builder, name, &attr, value)?;
                            }
                            _ => {}
                        }
                    }
                    "decorated_definition" => {
                        for (method, action_attr) in flagged_handlers(&statement) {
                            let action = match actions.get(&action_attr) {
                                Some(action) => Arc::clone(action),
                                None => inherited_action(&parents, &action_attr)
                                    .ok_or_else(|| {
                                        unsupported(
                                            name,
                                            &method,
                                            format!(
                                                "'{}' is not an action declaration",
                                                action_attr
                                            ),
                                        )
                                    })?,
                            };
                            builder = builder.flag_handler(method, &action);
                        }
                    }
                    _ => {}
                }
            }
        }

        if concrete && !has_name && parents.iter().all(|parent| parent.unit_name().is_none()) {
            let fallback = camel_to_kebab(name);
            logger::warn(&format!(
                "{} does not set a unit name; using '{}'",
                name, fallback
            ));
            builder = builder.name(fallback);
        }

        let class = builder.define()?;
        self.in_progress.remove(name);
        self.built.insert(name.to_string(), Arc::clone(&class));
        Ok(class)
    }
}

fn unsupported(class: &str, attr: &str, reason: impl Into<String>) -> DiscoveryError {
    DiscoveryError::UnsupportedDeclaration {
        class: class.to_string(),
        attr: attr.to_string(),
        reason: reason.into(),
    }
}

fn inherited_action(
    parents: &[Arc<UnitClass>],
    attr: &str,
) -> Option<Arc<Declaration<ActionSpec>>> {
    parents
        .iter()
        .find_map(|parent| parent.declaration::<ActionSpec>(attr).ok())
}

/// `attr = value` at class level, with the value evaluated.
fn class_assignment(statement: &PyNode<'_>) -> Option<(String, PyValue)> {
    let assignment = named_children(statement)
        .into_iter()
        .find(|child| child.kind() == "assignment")?;
    let left = assignment.field("left")?;
    if left.kind() != "identifier" {
        return None;
    }
    let right = assignment.field("right")?;
    Some((left.text().to_string(), evaluate(&right)))
}

/// `(method, action attribute)` for each `@<attr>.handler` on a method.
fn flagged_handlers(statement: &PyNode<'_>) -> Vec<(String, String)> {
    let Some(method) = statement
        .field("definition")
        .filter(|def| def.kind() == "function_definition")
        .and_then(|def| def.field("name"))
        .map(|n| n.text().to_string())
    else {
        return Vec::new();
    };

    named_children(statement)
        .into_iter()
        .filter(|child| child.kind() == "decorator")
        .filter_map(|decorator| {
            let text = decorator.text();
            let target = text.trim_start_matches('@').trim();
            let object = target.strip_suffix(".handler")?;
            let attr = object.rsplit('.').next().unwrap_or(object);
            Some((method.clone(), attr.to_string()))
        })
        .collect()
}

fn apply_static(
    builder: UnitClassBuilder,
    class: &str,
    attr: &str,
    value: PyValue,
) -> Result<UnitClassBuilder, DiscoveryError> {
    let expected = |what: &str, value: &PyValue| {
        unsupported(class, attr, format!("expected {}, got {}", what, value))
    };
    Ok(match (attr, value) {
        ("name", PyValue::Str(v)) => builder.name(v),
        ("summary", PyValue::Str(v)) => builder.summary(v),
        ("description", PyValue::Str(v)) => builder.description(v),
        ("maintainer", PyValue::Str(v)) => builder.maintainer(v),
        ("name" | "summary" | "description" | "maintainer", PyValue::None) => builder,
        ("subordinate", PyValue::Bool(v)) => builder.subordinate(v),
        ("subordinate", value) => return Err(expected("True or False", &value)),
        ("bases", value) => {
            let bases = match &value {
                PyValue::List(items) => items
                    .iter()
                    .map(bases_from_value)
                    .collect::<Result<Vec<_>, _>>(),
                other => bases_from_value(other).map(|bases| vec![bases]),
            }
            .map_err(|reason| unsupported(class, attr, reason))?;
            builder.bases(bases)
        }
        (_, value) => return Err(expected("a string literal", &value)),
    })
}

fn bases_from_value(value: &PyValue) -> Result<Bases, String> {
    let call = expect_call(value, "Bases")?;
    let run_on = base_list(call.arg(0, "run_on"))?;
    let build_on = base_list(call.arg(1, "build_on"))?;
    Ok(Bases::new(run_on, build_on))
}

fn base_list(value: Option<&PyValue>) -> Result<Vec<Base>, String> {
    match value {
        None => Err("Bases() needs run_on and build_on".to_string()),
        Some(PyValue::List(items)) => items.iter().map(base_from_value).collect(),
        Some(other) => Err(format!("expected a list of Base(), got {}", other)),
    }
}

fn base_from_value(value: &PyValue) -> Result<Base, String> {
    let call = expect_call(value, "Base")?;
    let text = |position: usize, keyword: &str, default: &str| match call.arg(position, keyword) {
        None => Ok(default.to_string()),
        Some(PyValue::Str(v)) => Ok(v.clone()),
        Some(other) => Err(format!("Base() expects a string for '{}', got {}", keyword, other)),
    };
    let mut base = Base::new(text(0, "name", "ubuntu")?, text(1, "channel", "20.04")?);
    if let Some(architectures) = call.arg(2, "architectures") {
        let PyValue::List(items) = architectures else {
            return Err(format!("expected a list of architectures, got {}", architectures));
        };
        let names = items
            .iter()
            .map(|item| match item {
                PyValue::Str(v) => Ok(v.clone()),
                other => Err(format!("architectures must be strings, got {}", other)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        base = base.with_architectures(names);
    }
    Ok(base)
}

fn expect_call<'v>(value: &'v PyValue, function: &str) -> Result<&'v PyCall, String> {
    match value {
        PyValue::Call(call) if call.function() == function => Ok(call),
        other => Err(format!("expected {}(...), got {}", function, other)),
    }
}
