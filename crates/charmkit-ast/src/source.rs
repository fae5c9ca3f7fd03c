//! Literal evaluation over the Python syntax tree
//!
//! Declarations in a unit class body are plain calls with literal arguments.
//! This module turns such expression nodes into [`PyValue`]s without running
//! any Python. Anything that is not a literal, a name or a call is kept as
//! [`PyValue::Other`] with its source text so callers can report it.

use ast_grep_core::source::StrDoc;
use ast_grep_core::Node;
use ast_grep_language::Python;
use std::fmt;

pub type PyNode<'r> = Node<'r, StrDoc<Python>>;

/// A statically evaluated Python expression.
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    /// A list or tuple display.
    List(Vec<PyValue>),
    /// A dict display, keys in source order.
    Dict(Vec<(PyValue, PyValue)>),
    Call(PyCall),
    /// An identifier or dotted attribute reference.
    Name(String),
    Other(String),
}

/// A call with evaluated arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PyCall {
    /// Callee as written, e.g. `require` or `charmkit.require`.
    pub callee: String,
    pub args: Vec<PyValue>,
    pub kwargs: Vec<(String, PyValue)>,
}

impl PyCall {
    /// Unqualified name of the called function.
    pub fn function(&self) -> &str {
        self.callee.rsplit('.').next().unwrap_or(&self.callee)
    }

    /// Argument passed by `keyword` or, failing that, at `position`.
    pub fn arg(&self, position: usize, keyword: &str) -> Option<&PyValue> {
        self.keyword(keyword).or_else(|| self.args.get(position))
    }

    pub fn keyword(&self, keyword: &str) -> Option<&PyValue> {
        self.kwargs
            .iter()
            .find(|(name, _)| name == keyword)
            .map(|(_, value)| value)
    }
}

impl fmt::Display for PyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PyValue::Str(s) => write!(f, "{:?}", s),
            PyValue::Int(v) => write!(f, "{}", v),
            PyValue::Float(v) => write!(f, "{}", v),
            PyValue::Bool(true) => f.write_str("True"),
            PyValue::Bool(false) => f.write_str("False"),
            PyValue::None => f.write_str("None"),
            PyValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            PyValue::Dict(_) => f.write_str("{...}"),
            PyValue::Call(call) => write!(f, "{}(...)", call.callee),
            PyValue::Name(name) | PyValue::Other(name) => f.write_str(name),
        }
    }
}

/// Named children of `node`, without comments.
pub fn named_children<'r>(node: &PyNode<'r>) -> Vec<PyNode<'r>> {
    node.children()
        .filter(|child| child.is_named() && child.kind() != "comment")
        .collect()
}

/// Evaluate an expression node.
pub fn evaluate(node: &PyNode<'_>) -> PyValue {
    let text = node.text();
    let other = || PyValue::Other(text.to_string());

    match &*node.kind() {
        "string" => parse_string_literal(&text).map_or_else(other, PyValue::Str),
        "concatenated_string" => {
            let mut joined = String::new();
            for part in named_children(node) {
                match evaluate(&part) {
                    PyValue::Str(s) => joined.push_str(&s),
                    _ => return other(),
                }
            }
            PyValue::Str(joined)
        }
        "integer" => parse_integer(&text).map_or_else(other, PyValue::Int),
        "float" => text
            .replace('_', "")
            .parse::<f64>()
            .map_or_else(|_| other(), PyValue::Float),
        "true" => PyValue::Bool(true),
        "false" => PyValue::Bool(false),
        "none" => PyValue::None,
        "unary_operator" => {
            let operand = node.field("argument").map(|arg| evaluate(&arg));
            let negative = text.trim_start().starts_with('-');
            match (negative, operand) {
                (true, Some(PyValue::Int(v))) => PyValue::Int(-v),
                (true, Some(PyValue::Float(v))) => PyValue::Float(-v),
                (false, Some(value @ (PyValue::Int(_) | PyValue::Float(_)))) => value,
                _ => other(),
            }
        }
        "list" | "tuple" => PyValue::List(named_children(node).iter().map(evaluate).collect()),
        "dictionary" => {
            let mut pairs = Vec::new();
            for child in named_children(node) {
                let (Some(key), Some(value)) = (child.field("key"), child.field("value")) else {
                    return other();
                };
                pairs.push((evaluate(&key), evaluate(&value)));
            }
            PyValue::Dict(pairs)
        }
        "parenthesized_expression" => named_children(node)
            .first()
            .map_or_else(other, evaluate),
        "identifier" | "attribute" => PyValue::Name(text.to_string()),
        "call" => parse_call(node).map_or_else(other, PyValue::Call),
        _ => other(),
    }
}

fn parse_call(node: &PyNode<'_>) -> Option<PyCall> {
    let callee = node.field("function")?.text().to_string();
    let arguments = node.field("arguments")?;
    if arguments.kind() != "argument_list" {
        return None;
    }

    let mut call = PyCall {
        callee,
        args: Vec::new(),
        kwargs: Vec::new(),
    };
    for argument in named_children(&arguments) {
        match &*argument.kind() {
            "keyword_argument" => {
                let name = argument.field("name")?.text().to_string();
                let value = evaluate(&argument.field("value")?);
                call.kwargs.push((name, value));
            }
            // *args / **kwargs cannot be resolved statically
            "list_splat" | "dictionary_splat" => return None,
            _ => call.args.push(evaluate(&argument)),
        }
    }
    Some(call)
}

fn parse_integer(text: &str) -> Option<i64> {
    let digits = text.replace('_', "");
    let lower = digits.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else {
        lower.parse().ok()
    }
}

/// Parse a single string literal token, including prefix and quotes.
///
/// Returns `None` for f-strings and byte strings.
pub fn parse_string_literal(text: &str) -> Option<String> {
    let quote_start = text.find(['\'', '"'])?;
    let prefix = text[..quote_start].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let raw = prefix.contains('r');

    let literal = &text[quote_start..];
    let body = ["\"\"\"", "'''", "\"", "'"].iter().find_map(|quote| {
        literal
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
            .filter(|_| literal.len() >= 2 * quote.len())
    })?;

    if raw {
        Some(body.to_string())
    } else {
        Some(unescape(body))
    }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(kind @ ('x' | 'u' | 'U')) => {
                let width = match kind {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let code: String = chars.by_ref().take(width).collect();
                match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('\\');
                        out.push(kind);
                        out.push_str(&code);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
