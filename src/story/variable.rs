//! Variables and collections (spec.md §3 "Variable declaration", "Collections").

use crate::base::Name;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Integer,
    Float,
    String,
    Boolean,
    List,
    Array,
    Map,
    Invalid,
}

impl VarType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Integer(_) => Self::Integer,
            Value::Float(_) => Self::Float,
            Value::String(_) => Self::String,
            Value::Boolean(_) => Self::Boolean,
            Value::List(_) => Self::List,
            Value::Array(_) => Self::Array,
            Value::Map(_) => Self::Map,
            Value::Invalid(_) => Self::Invalid,
        }
    }
}

/// A runtime value as parsed from source text. Expressions are never
/// evaluated here (spec.md §1 Non-goals) — this only covers literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    List(Vec<ListValueEntry>),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// Preserved verbatim so the validator can still report on it.
    Invalid(String),
}

impl Value {
    /// Parse a single literal token (number, boolean, or quoted/bare
    /// string) the way `@var:` and `@vars` entries do (spec.md §4.2 step 1).
    pub fn parse_literal(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(stripped) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            return Value::String(unescape(stripped));
        }
        if raw == "true" {
            return Value::Boolean(true);
        }
        if raw == "false" {
            return Value::Boolean(false);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Float(f);
        }
        Value::String(raw.to_string())
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// One entry of a `LIST` declaration: a symbol, and whether it starts in
/// the "active" subset (source form `(symbol)`).
#[derive(Debug, Clone, PartialEq)]
pub struct ListValueEntry {
    pub name: Name,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: Name,
    pub var_type: VarType,
    pub default: Value,
    pub list_values: Option<Vec<ListValueEntry>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListCollection {
    pub name: Name,
    pub entries: Vec<ListValueEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayCollection {
    pub name: Name,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapCollection {
    pub name: Name,
    pub entries: IndexMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_recognizes_kinds() {
        assert_eq!(Value::parse_literal("42"), Value::Integer(42));
        assert_eq!(Value::parse_literal("3.5"), Value::Float(3.5));
        assert_eq!(Value::parse_literal("true"), Value::Boolean(true));
        assert_eq!(Value::parse_literal("\"hi\""), Value::String("hi".into()));
        assert_eq!(Value::parse_literal("bare"), Value::String("bare".into()));
    }

    #[test]
    fn parse_literal_unescapes_quoted_strings() {
        assert_eq!(Value::parse_literal("\"a\\nb\""), Value::String("a\nb".into()));
    }
}
