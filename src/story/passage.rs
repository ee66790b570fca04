//! Passages, choices, gathers, and tunnel calls (spec.md §3, §4.2).

use super::content::ContentNode;
use crate::base::{Name, Span};
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKind {
    Once,
    Sticky,
}

/// A `+`/`*` choice line. Exactly one of `condition`/`action` is set per
/// spec.md §3: a `{…}` block is classified `do ` → action, `if ` → condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub text: String,
    pub target: String,
    pub condition: Option<String>,
    pub action: Option<String>,
    pub kind: ChoiceKind,
    pub depth: usize,
    pub location: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gather {
    pub depth: usize,
    pub content: String,
    pub location: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TunnelCall {
    pub target: String,
    /// 1-based ordinal of this call among the passage's tunnel calls.
    pub position: usize,
}

/// A bare `-> Target` divert that isn't a choice target or a tunnel call.
#[derive(Debug, Clone, PartialEq)]
pub struct Divert {
    pub target: String,
    pub location: Span,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PassageMetadata {
    pub position: Option<(f64, f64)>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub fallback: Option<String>,
    pub on_enter: Option<String>,
    pub on_exit: Option<String>,
    pub extra: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    /// `passage_<counter>_<qualified-name>`; unique within a Story (P2).
    pub id: Name,
    pub display_name: String,
    pub qualified_name: String,
    pub source_name: String,
    pub namespace: Option<Name>,
    /// Raw body text, preserving interpolation sigils and block markers
    /// for C3/the runtime to interpret later.
    pub content: String,
    pub choices: Vec<Choice>,
    pub gathers: Vec<Gather>,
    pub tunnel_calls: Vec<TunnelCall>,
    pub diverts: Vec<Divert>,
    pub has_tunnel_return: bool,
    pub tags: Vec<String>,
    pub metadata: PassageMetadata,
    pub location: Span,
    pub parsed_content: Option<Vec<ContentNode>>,
}

impl Passage {
    pub fn new(id: Name, qualified_name: String, source_name: String, location: Span) -> Self {
        Self {
            id,
            display_name: source_name.clone(),
            qualified_name,
            source_name,
            namespace: None,
            content: String::new(),
            choices: Vec::new(),
            gathers: Vec::new(),
            tunnel_calls: Vec::new(),
            diverts: Vec::new(),
            has_tunnel_return: false,
            tags: Vec::new(),
            metadata: PassageMetadata::default(),
            location,
            parsed_content: None,
        }
    }

    /// Every name referenced by this passage's flow constructs — choice
    /// targets, tunnel calls — used by the validator (spec.md §4.5) and by
    /// reachability analysis (spec.md §4.5 orphan detection).
    pub fn referenced_targets(&self) -> impl Iterator<Item = &str> {
        self.choices
            .iter()
            .map(|c| c.target.as_str())
            .chain(self.tunnel_calls.iter().map(|t| t.target.as_str()))
            .chain(self.diverts.iter().map(|d| d.target.as_str()))
    }
}
