//! [`Story`]: the root of a parsed work (spec.md §3 "Story", §4.6).

use super::module::{Function, Include, Namespace};
use super::passage::Passage;
use super::settings::Settings;
use super::variable::{ArrayCollection, ListCollection, MapCollection, VariableDecl};
use crate::base::{Name, Span};
use crate::diagnostics::DiagnosticCollector;
use indexmap::IndexMap;

/// A single `@setting: key = value` directive as written, kept verbatim for
/// the validator (C5) to type-check against the recognized schema
/// (spec.md §3 "Settings", §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct RawSetting {
    pub key: String,
    pub value: String,
    pub location: Span,
}

#[derive(Debug, Clone, Default)]
pub struct StoryMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    pub ifid: Option<String>,
    pub ifid_invalid: bool,
    pub start: Option<String>,
    pub description: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub theme: Option<String>,
    pub fallback: Option<String>,
    pub seed: Option<String>,
    /// Unrecognized header directives, stored verbatim (spec.md §4.2 step 1).
    pub extra: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct PresentationDirectives {
    pub theme: Option<String>,
    pub styles: Vec<String>,
}

/// Error raised by a [`Story`] builder method when an invariant would be
/// violated. These are host-contract violations (spec.md §7's "programmer
/// errors"), never produced for ordinary source-level defects — those go
/// through [`crate::diagnostics::Diagnostic`] instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoryBuildError {
    #[error("a passage with id `{0}` already exists")]
    DuplicatePassageId(Name),
    #[error("no passage with id `{0}` exists")]
    NoSuchPassage(Name),
}

/// Root of a parsed work (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct Story {
    pub metadata: StoryMetadata,
    passages: IndexMap<Name, Passage>,
    /// Qualified name → passage id, first-occurrence wins.
    passage_by_name: IndexMap<String, Name>,
    start_passage: Option<Name>,
    pub variables: IndexMap<Name, VariableDecl>,
    pub lists: IndexMap<Name, ListCollection>,
    pub arrays: IndexMap<Name, ArrayCollection>,
    pub maps: IndexMap<Name, MapCollection>,
    pub includes: Vec<Include>,
    pub functions: IndexMap<Name, Function>,
    pub namespaces: IndexMap<Name, Namespace>,
    pub settings: Settings,
    pub raw_settings: Vec<RawSetting>,
    pub presentation: PresentationDirectives,
    pub diagnostics: DiagnosticCollector,
}

impl Story {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a passage. Fails only on id collision (a parser bug, since
    /// ids are generated from a monotonic counter); a duplicate qualified
    /// name is a source-level defect handled by the validator instead —
    /// the first occurrence stays canonical in `passage_by_name`.
    pub fn add_passage(&mut self, passage: Passage) -> Result<(), StoryBuildError> {
        if self.passages.contains_key(&passage.id) {
            return Err(StoryBuildError::DuplicatePassageId(passage.id));
        }
        self.passage_by_name.entry(passage.qualified_name.clone()).or_insert_with(|| passage.id.clone());
        self.passages.insert(passage.id.clone(), passage);
        Ok(())
    }

    pub fn set_start_passage(&mut self, id: Name) -> Result<(), StoryBuildError> {
        if !self.passages.contains_key(&id) {
            return Err(StoryBuildError::NoSuchPassage(id));
        }
        self.start_passage = Some(id);
        Ok(())
    }

    pub fn start_passage(&self) -> Option<&Passage> {
        self.start_passage.as_ref().and_then(|id| self.passages.get(id))
    }

    pub fn start_passage_id(&self) -> Option<&Name> {
        self.start_passage.as_ref()
    }

    /// Passages in insertion order, which equals source order.
    pub fn passages(&self) -> impl Iterator<Item = &Passage> {
        self.passages.values()
    }

    pub fn passages_mut(&mut self) -> impl Iterator<Item = &mut Passage> {
        self.passages.values_mut()
    }

    pub fn passage(&self, id: &str) -> Option<&Passage> {
        self.passages.get(id)
    }

    pub fn passage_mut(&mut self, id: &str) -> Option<&mut Passage> {
        self.passages.get_mut(id)
    }

    /// Lookup by qualified name; first occurrence wins.
    pub fn passage_by_name(&self, qualified_name: &str) -> Option<&Passage> {
        self.passage_by_name.get(qualified_name).and_then(|id| self.passages.get(id))
    }

    pub fn passage_mut_by_name(&mut self, qualified_name: &str) -> Option<&mut Passage> {
        let id = self.passage_by_name.get(qualified_name)?.clone();
        self.passages.get_mut(&id)
    }

    pub fn passage_count(&self) -> usize {
        self.passages.len()
    }

    pub fn passage_ids(&self) -> impl Iterator<Item = &Name> {
        self.passages.keys()
    }

    /// Consume the story, yielding its passages in insertion order. Used by
    /// the include resolver (C4) to merge an included document's passages
    /// into the parent story.
    pub fn into_passages(self) -> impl Iterator<Item = Passage> {
        self.passages.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{Position, Span};
    use std::sync::Arc;

    fn passage(id: &str, qname: &str) -> Passage {
        Passage::new(Arc::from(id), qname.to_string(), qname.to_string(), Span::point(Position::start()))
    }

    #[test]
    fn add_passage_rejects_duplicate_id() {
        let mut story = Story::new();
        story.add_passage(passage("p1", "A")).unwrap();
        let err = story.add_passage(passage("p1", "B")).unwrap_err();
        assert_eq!(err, StoryBuildError::DuplicatePassageId(Arc::from("p1")));
    }

    #[test]
    fn passage_by_name_keeps_first_occurrence() {
        let mut story = Story::new();
        story.add_passage(passage("p1", "A")).unwrap();
        story.add_passage(passage("p2", "A")).unwrap();
        assert_eq!(story.passage_by_name("A").unwrap().id.as_ref(), "p1");
    }

    #[test]
    fn set_start_passage_requires_existing_id() {
        let mut story = Story::new();
        assert!(story.set_start_passage(Arc::from("missing")).is_err());
        story.add_passage(passage("p1", "A")).unwrap();
        story.set_start_passage(Arc::from("p1")).unwrap();
        assert_eq!(story.start_passage().unwrap().id.as_ref(), "p1");
    }
}
