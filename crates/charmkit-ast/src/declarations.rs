//! Rebuilding declarations from DSL calls
//!
//! Positional arguments come first, then the optional `name`; every argument
//! may also be passed by keyword.
//!
//! | call        | arguments                                          |
//! |-------------|----------------------------------------------------|
//! | `require`   | `interface, name`                                  |
//! | `provide`   | `interface, name`                                  |
//! | `peer`      | `interface, name`                                  |
//! | `config`    | `var, name`                                        |
//! | `action`    | `params, name, description`                        |
//! | `storage`   | `type, location, name`                             |
//! | `container` | `resource, name`                                   |
//! | `resource`  | `type, description, upstream_source, name`         |

use charmkit_manifest::{
    action, config, container, peer, provide, require, resource, storage, Decl, Declaration,
    DeclarationSpec, Param, ParamType, ParamValue,
};

use crate::source::{PyCall, PyValue};

/// Names of the calls recognized as declarations.
pub const DECLARATION_CALLS: &[&str] = &[
    "require",
    "provide",
    "peer",
    "config",
    "action",
    "storage",
    "container",
    "resource",
];

/// Whether `call` constructs a declaration.
pub fn is_declaration_call(call: &PyCall) -> bool {
    DECLARATION_CALLS.contains(&call.function())
}

/// Build the declaration constructed by `call`. The error is a human-readable
/// reason, wrapped by the caller with the class and attribute.
pub fn declaration_from_call(call: &PyCall) -> Result<Decl, String> {
    match call.function() {
        "require" | "provide" | "peer" => {
            let interface = required_str(call, 0, "interface")?;
            let name = optional_str(call, 1, "name")?;
            let declaration = match call.function() {
                "require" => require(interface),
                "provide" => provide(interface),
                _ => peer(interface),
            };
            Ok(with_name(declaration, name).into())
        }
        "config" => {
            let var = call
                .arg(0, "var")
                .or_else(|| call.keyword("param"))
                .ok_or_else(|| "config() needs a parameter".to_string())?;
            let param = param_from_value(var)?;
            let name = optional_str(call, 1, "name")?;
            Ok(with_name(config(param), name).into())
        }
        "action" => {
            let mut declaration = action();
            if let Some(value) = call.arg(0, "params") {
                for (key, param) in params_from_value(value)? {
                    declaration = declaration.param(key, param);
                }
            }
            if let Some(description) = optional_str(call, 2, "description")? {
                declaration = declaration.with_description(description);
            }
            let name = optional_str(call, 1, "name")?;
            Ok(with_name(declaration, name).into())
        }
        "storage" => {
            let storage_type = required_str(call, 0, "type")?;
            let mut declaration = storage(storage_type);
            if let Some(location) = optional_str(call, 1, "location")? {
                declaration = declaration.at(location);
            }
            let name = optional_str(call, 2, "name")?;
            Ok(with_name(declaration, name).into())
        }
        "container" => {
            let resource_name = required_str(call, 0, "resource")?;
            let name = optional_str(call, 1, "name")?;
            Ok(with_name(container(resource_name), name).into())
        }
        "resource" => {
            let mut declaration = resource();
            if let Some(resource_type) = optional_str(call, 0, "type")? {
                declaration = declaration.of_type(resource_type);
            }
            if let Some(description) = optional_str(call, 1, "description")? {
                declaration = declaration.with_description(description);
            }
            if let Some(source) = optional_str(call, 2, "upstream_source")? {
                declaration = declaration.with_upstream_source(source);
            }
            let name = optional_str(call, 3, "name")?;
            Ok(with_name(declaration, name).into())
        }
        other => Err(format!("'{}' is not a declaration", other)),
    }
}

fn with_name<S: DeclarationSpec>(declaration: Declaration<S>, name: Option<String>) -> Declaration<S> {
    match name {
        Some(name) => declaration.named(name),
        None => declaration,
    }
}

fn required_str(call: &PyCall, position: usize, keyword: &str) -> Result<String, String> {
    optional_str(call, position, keyword)?
        .ok_or_else(|| format!("{}() is missing '{}'", call.function(), keyword))
}

/// A string argument; `None` and absence both mean unset.
fn optional_str(call: &PyCall, position: usize, keyword: &str) -> Result<Option<String>, String> {
    match call.arg(position, keyword) {
        None | Some(PyValue::None) => Ok(None),
        Some(PyValue::Str(value)) => Ok(Some(value.clone())),
        Some(other) => Err(format!(
            "{}() expects a string literal for '{}', got {}",
            call.function(),
            keyword,
            other
        )),
    }
}

/// Parse a parameter constructor: `string()`, `integer()`, `float_()` or
/// `Param(type, description, default)`.
pub fn param_from_value(value: &PyValue) -> Result<Param, String> {
    let PyValue::Call(call) = value else {
        return Err(format!("expected a parameter constructor, got {}", value));
    };

    let (param_type, offset) = match call.function() {
        "string" => (ParamType::String, 0),
        "integer" => (ParamType::Integer, 0),
        "float_" | "float" => (ParamType::Float, 0),
        "Param" => {
            let type_name = required_str(call, 0, "type")?;
            let param_type = match type_name.as_str() {
                "string" => ParamType::String,
                "integer" => ParamType::Integer,
                "float" => ParamType::Float,
                other => return Err(format!("unknown parameter type '{}'", other)),
            };
            (param_type, 1)
        }
        other => return Err(format!("'{}' is not a parameter constructor", other)),
    };

    let description = optional_str(call, offset, "description")?.unwrap_or_default();
    let mut param = Param::new(param_type, description);
    if let Some(default) = call.arg(offset + 1, "default") {
        if let Some(default) = default_value(default)? {
            param = param.with_default(default);
        }
    }
    Ok(param)
}

fn default_value(value: &PyValue) -> Result<Option<ParamValue>, String> {
    match value {
        PyValue::None => Ok(None),
        PyValue::Str(v) => Ok(Some(ParamValue::String(v.clone()))),
        PyValue::Int(v) => Ok(Some(ParamValue::Integer(*v))),
        PyValue::Float(v) => Ok(Some(ParamValue::Float(*v))),
        other => Err(format!(
            "parameter defaults must be string or number literals, got {}",
            other
        )),
    }
}

/// Parse an action's parameters: `dict(k=..)`, `params(k=..)`, `{'k': ..}`
/// or `None`.
pub fn params_from_value(value: &PyValue) -> Result<Vec<(String, Param)>, String> {
    match value {
        PyValue::None => Ok(Vec::new()),
        PyValue::Call(call) if matches!(call.function(), "dict" | "params") => {
            if !call.args.is_empty() {
                return Err(format!(
                    "{}() parameters must be passed by keyword",
                    call.function()
                ));
            }
            call.kwargs
                .iter()
                .map(|(key, param)| Ok((key.clone(), param_from_value(param)?)))
                .collect()
        }
        PyValue::Dict(pairs) => pairs
            .iter()
            .map(|(key, param)| match key {
                PyValue::Str(key) => Ok((key.clone(), param_from_value(param)?)),
                other => Err(format!("parameter names must be strings, got {}", other)),
            })
            .collect(),
        other => Err(format!("unsupported action parameters {}", other)),
    }
}
