//! Content AST produced by the Content Parser (C3, spec.md §4.3).
//!
//! These types are part of the story model: a [`super::Passage`] holds its
//! raw source text always, and a lazily-computed [`ContentNode`] tree once
//! C3 has run (on full parse, or on demand from the incremental parser).

use crate::base::constants;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl AttrValue {
    /// Coerce a bare attribute value string to bool/number when
    /// unambiguous, else keep it as a string (spec.md §4.3).
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "true" => AttrValue::Bool(true),
            "false" => AttrValue::Bool(false),
            _ => {
                if let Ok(n) = raw.parse::<f64>() {
                    AttrValue::Number(n)
                } else {
                    AttrValue::String(raw.trim_matches('"').to_string())
                }
            }
        }
    }
}

pub type Attrs = IndexMap<String, AttrValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Bold,
    Italic,
    Strikethrough,
    InlineCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOp {
    Replace,
    Append,
    Prepend,
    Show,
    Hide,
}

impl HookOp {
    /// `s` must be one of [`constants::HOOK_OPERATIONS`], the single
    /// source of truth both for parsing and for the content parser's
    /// "unknown hook operation" diagnostic.
    pub fn parse(s: &str) -> Option<Self> {
        if !constants::HOOK_OPERATIONS.contains(&s) {
            return None;
        }
        Some(match s {
            "replace" => Self::Replace,
            "append" => Self::Append,
            "prepend" => Self::Prepend,
            "show" => Self::Show,
            "hide" => Self::Hide,
            _ => unreachable!("HOOK_OPERATIONS and this match must stay in sync"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Embed,
}

/// One node of a passage's parsed content tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentNode {
    Text(String),
    Emphasis { style: Emphasis, children: Vec<ContentNode> },
    FencedCode { lang: Option<String>, code: String },
    Blockquote { depth: usize, children: Vec<ContentNode> },
    ListItem { ordered: Option<u32>, children: Vec<ContentNode> },
    HorizontalRule,
    HookDefinition { name: String, body: Vec<ContentNode> },
    HookOperation { op: HookOp, target: String, body: Vec<ContentNode> },
    Media { kind: MediaKind, src: String, alt: Option<String>, title: Option<String>, attrs: Attrs },
    /// An interpolation or conditional block the scanner tokenized but
    /// that C3 passes through unevaluated for the runtime.
    Interpolation(String),
}
