//! Round-trip comparator for Ink interchange (spec.md §4.8, property P6).
//!
//! This is validator-only output (spec.md §7): a [`Difference`] list, never
//! a [`crate::diagnostics::Diagnostic`]. Typical use is comparing a story
//! against `import(export(story))` to check the pair preserved semantics.

use crate::story::Story;

/// One divergence found by [`compare`]. Content differences are reported
/// only after whitespace normalization, since Ink's line/break encoding is
/// free to reflow without changing meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum Difference {
    MissingPassage(String),
    ExtraPassage(String),
    ContentMismatch { passage: String, left: String, right: String },
    MissingVariable(String),
    VariableTypeMismatch { name: String, left: String, right: String },
    StartMismatch { left: Option<String>, right: Option<String> },
}

/// Compare `left` against `right`, reporting every divergence. Identical
/// inputs yield an empty list (spec.md §4.8).
pub fn compare(left: &Story, right: &Story) -> Vec<Difference> {
    let mut diffs = Vec::new();

    for passage in left.passages() {
        match right.passage_by_name(&passage.qualified_name) {
            None => diffs.push(Difference::MissingPassage(passage.qualified_name.clone())),
            Some(other) => {
                let a = normalize(&passage.content);
                let b = normalize(&other.content);
                if a != b {
                    diffs.push(Difference::ContentMismatch { passage: passage.qualified_name.clone(), left: a, right: b });
                }
            }
        }
    }
    for passage in right.passages() {
        if left.passage_by_name(&passage.qualified_name).is_none() {
            diffs.push(Difference::ExtraPassage(passage.qualified_name.clone()));
        }
    }

    for (name, decl) in &left.variables {
        match right.variables.get(name) {
            None => diffs.push(Difference::MissingVariable(name.to_string())),
            Some(other) if other.var_type != decl.var_type => diffs.push(Difference::VariableTypeMismatch {
                name: name.to_string(),
                left: format!("{:?}", decl.var_type),
                right: format!("{:?}", other.var_type),
            }),
            _ => {}
        }
    }

    let left_start = left.start_passage().map(|p| p.qualified_name.clone());
    let right_start = right.start_passage().map(|p| p.qualified_name.clone());
    if left_start != right_start {
        diffs.push(Difference::StartMismatch { left: left_start, right: right_start });
    }

    diffs
}

fn normalize(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}
