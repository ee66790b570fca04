//! `INCLUDE`, `FUNCTION`, `NAMESPACE` constructs (spec.md §3 "Module", §4.4).

use crate::base::Name;

#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub path: String,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Name,
    pub qualified_name: Name,
    pub params: Vec<String>,
    /// Body captured verbatim; evaluation is the runtime's concern.
    pub body: String,
    pub namespace: Option<Name>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Namespace {
    pub name: Name,
    pub qualified_name: Name,
    pub nested: Vec<Name>,
    pub passages: Vec<Name>,
    pub functions: Vec<Name>,
}

/// The parts of a dot-separated qualified name (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub parts: Vec<String>,
    pub full: String,
    pub namespace: Option<String>,
    pub name: String,
}

pub fn parse_qualified_name(raw: &str) -> QualifiedName {
    let parts: Vec<String> = raw.split('.').map(|s| s.to_string()).collect();
    let name = parts.last().cloned().unwrap_or_default();
    let namespace = if parts.len() > 1 {
        Some(parts[..parts.len() - 1].join("."))
    } else {
        None
    };
    QualifiedName { parts, full: raw.to_string(), namespace, name }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_qualified_name() {
        let q = parse_qualified_name("Outer.Inner.Leaf");
        assert_eq!(q.name, "Leaf");
        assert_eq!(q.namespace.as_deref(), Some("Outer.Inner"));
        assert_eq!(q.parts, vec!["Outer", "Inner", "Leaf"]);
    }

    #[test]
    fn single_part_has_no_namespace() {
        let q = parse_qualified_name("Leaf");
        assert_eq!(q.namespace, None);
    }
}
