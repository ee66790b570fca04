//! C7: the incremental parser (spec.md §4.7).
//!
//! Wraps C1–C5 for editor use, keyed by document URI. Small in-passage
//! edits refresh only the affected passages' content trees; anything that
//! could move passage boundaries (a full-replace edit, or a change that
//! touches a `::` passage marker) forces a full reparse.

use crate::base::{LineCol, LineIndex};
use crate::config::ParserConfig;
use crate::error::{Result, WhiskerError};
use crate::parser::{parse_content, parse_structural};
use crate::scanner::scan;
use crate::story::Story;
use crate::validate::validate;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;

/// 1-based inclusive line bounds of a passage within its document, as
/// spec.md §4.7 describes the cache's `passage_ranges`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassageRange {
    pub start_line: usize,
    pub end_line: usize,
}

/// One LSP-style text edit: `range: None` means "replace the whole
/// document with `text`"; otherwise `text` replaces the 0-based
/// `[start, end)` region.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChange {
    pub range: Option<ChangeRange>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeRange {
    pub start: LineCol,
    pub end: LineCol,
}

/// Everything cached for one open document.
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub story: Story,
    pub content: String,
    pub line_map: LineIndex,
    /// Keyed by passage qualified name.
    pub passage_ranges: IndexMap<String, PassageRange>,
}

/// Per-URI document cache. Cheap to clone (an `Arc`-backed `Story` inside,
/// so the cache stays `Send`/`Sync`); wrapped in `RwLock` so a host can
/// share one cache across an editor's request-handling threads.
pub struct DocumentCache {
    documents: RwLock<HashMap<String, CachedDocument>>,
    config: ParserConfig,
}

impl DocumentCache {
    pub fn new(config: ParserConfig) -> Self {
        Self { documents: RwLock::new(HashMap::new()), config }
    }

    /// Full parse of `content`; replaces any existing cache entry for `uri`.
    pub fn parse_document(&self, uri: &str, content: &str) -> Story {
        let cached = build_cached(content, &self.config);
        let story = cached.story.clone();
        self.documents.write().insert(uri.to_string(), cached);
        story
    }

    pub fn close_document(&self, uri: &str) {
        self.documents.write().remove(uri);
    }

    pub fn get(&self, uri: &str) -> Option<Story> {
        self.documents.read().get(uri).map(|c| c.story.clone())
    }

    /// Apply `changes` (in order) against the cached document for `uri`,
    /// following spec.md §4.7's six-step algorithm, and return the
    /// resulting story.
    pub fn update_document(&self, uri: &str, changes: &[TextChange], new_content: &str) -> Result<Story> {
        let needs_full_reparse = {
            let documents = self.documents.read();
            let Some(cached) = documents.get(uri) else {
                return Err(WhiskerError::UnknownDocument(uri.to_string()));
            };
            changes.iter().any(|c| c.range.is_none()) || touches_passage_marker(cached, changes)
        };

        if needs_full_reparse {
            return Ok(self.parse_document(uri, new_content));
        }

        let mut documents = self.documents.write();
        let cached = documents.get_mut(uri).ok_or_else(|| WhiskerError::UnknownDocument(uri.to_string()))?;

        let mut affected: Vec<String> = Vec::new();
        for change in changes {
            let range = change.range.expect("full-replace changes already triggered a full reparse above");
            if range.end < range.start {
                return Err(WhiskerError::InvalidEditRange {
                    start: (range.start.line, range.start.col),
                    end: (range.end.line, range.end.col),
                });
            }
            let start_line_1 = range.start.line as usize + 1;
            let end_line_1 = range.end.line as usize + 1;
            for (name, r) in cached.passage_ranges.iter() {
                if r.start_line <= end_line_1 && r.end_line >= start_line_1 && !affected.contains(name) {
                    affected.push(name.clone());
                }
            }
        }

        let old_line_count = cached.line_map.line_count();
        cached.content = new_content.to_string();
        cached.line_map = LineIndex::new(new_content);
        let new_line_count = cached.line_map.line_count();
        let delta = new_line_count as i64 - old_line_count as i64;

        let first_changed_line =
            changes.iter().filter_map(|c| c.range.map(|r| r.start.line as usize + 1)).min().unwrap_or(1);

        for (name, range) in cached.passage_ranges.iter_mut() {
            if range.start_line > first_changed_line {
                range.start_line = shift_line(range.start_line, delta);
                range.end_line = shift_line(range.end_line, delta);
            }
            if affected.contains(name) {
                let body = slice_lines(&cached.content, range.start_line, range.end_line);
                let (parsed, _diags) = parse_content(&body, &self.config);
                if let Some(passage) = cached.story.passage_mut_by_name(name) {
                    passage.content = body;
                    passage.parsed_content = Some(parsed);
                }
            }
        }

        Ok(cached.story.clone())
    }
}

fn shift_line(line: usize, delta: i64) -> usize {
    (line as i64 + delta).max(1) as usize
}

/// Extract the 1-based inclusive line range `[start_line, end_line]` from
/// `content`, joined with `\n`.
fn slice_lines(content: &str, start_line: usize, end_line: usize) -> String {
    content
        .lines()
        .skip(start_line.saturating_sub(1))
        .take(end_line.saturating_sub(start_line).saturating_add(1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Step 2: a change is boundary-affecting if either its old (pre-edit,
/// from the cache) or new text contains a passage marker.
fn touches_passage_marker(cached: &CachedDocument, changes: &[TextChange]) -> bool {
    for change in changes {
        if change.text.contains("::") {
            return true;
        }
        if let Some(range) = change.range {
            let start = u32::from(cached.line_map.offset(range.start)) as usize;
            let end = u32::from(cached.line_map.offset(range.end)) as usize;
            if let Some(old_text) = cached.content.get(start.min(cached.content.len())..end.min(cached.content.len()))
            {
                if old_text.contains("::") {
                    return true;
                }
            }
        }
    }
    false
}

fn build_cached(content: &str, config: &ParserConfig) -> CachedDocument {
    let scan_result = scan(content);
    let mut story = parse_structural(content, &scan_result.tokens, config);
    story.diagnostics.extend(scan_result.diagnostics);

    let mut passage_ranges = IndexMap::new();
    for passage in story.passages() {
        passage_ranges.insert(
            passage.qualified_name.clone(),
            PassageRange { start_line: passage.location.start.line, end_line: passage.location.end.line },
        );
    }

    for passage in story.passages_mut() {
        let (parsed, _diags) = parse_content(&passage.content, config);
        passage.parsed_content = Some(parsed);
    }

    let extra = validate(&mut story, config);
    story.diagnostics.extend(extra);

    CachedDocument { story, content: content.to_string(), line_map: LineIndex::new(content), passage_ranges }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lc(line: u32, col: u32) -> LineCol {
        LineCol { line, col }
    }

    #[test]
    fn parse_document_builds_passage_ranges() {
        let cache = DocumentCache::new(ParserConfig::default());
        let story = cache.parse_document("doc1", ":: Start\nhello\n:: Next\nworld\n");
        assert_eq!(story.passage_count(), 2);
    }

    #[test]
    fn full_replace_change_forces_reparse() {
        let cache = DocumentCache::new(ParserConfig::default());
        cache.parse_document("doc1", ":: Start\nhello\n");
        let changes = vec![TextChange { range: None, text: ":: Start\nbye\n".to_string() }];
        let story = cache.update_document("doc1", &changes, ":: Start\nbye\n").unwrap();
        assert_eq!(story.passage_by_name("Start").unwrap().content.trim(), "bye");
    }

    #[test]
    fn unknown_document_errors() {
        let cache = DocumentCache::new(ParserConfig::default());
        let changes = vec![TextChange { range: Some(ChangeRange { start: lc(0, 0), end: lc(0, 0) }), text: String::new() }];
        assert!(cache.update_document("missing", &changes, "").is_err());
    }

    #[test]
    fn in_passage_edit_refreshes_content_only() {
        let cache = DocumentCache::new(ParserConfig::default());
        cache.parse_document("doc1", ":: Start\nhello world\n:: Next\nmore\n");
        let changes = vec![TextChange {
            range: Some(ChangeRange { start: lc(1, 0), end: lc(1, 5) }),
            text: "howdy".to_string(),
        }];
        let new_content = ":: Start\nhowdy world\n:: Next\nmore\n";
        let story = cache.update_document("doc1", &changes, new_content).unwrap();
        assert!(story.passage_by_name("Start").unwrap().content.contains("howdy"));
        assert_eq!(story.passage_count(), 2);
    }
}
