//! C4: module & namespace resolution (spec.md §4.4).
//!
//! `NAMESPACE`/`END NAMESPACE` scoping and qualified-name construction
//! happen inline during the structural pass (C2), since both need the
//! same single token-stream traversal the structural parser already
//! performs — see [`crate::parser::parse_structural`]. What's left here is
//! `INCLUDE` resolution: the crate never touches the filesystem or network
//! itself (spec.md §1 Non-goals), so loading is delegated to a
//! host-provided [`IncludeLoader`], with a cycle guard capped at
//! `max_include_depth`.

use crate::base::constants;
use crate::config::ParserConfig;
use crate::diagnostics::{codes, Diagnostic};
use crate::parser::parse_structural;
use crate::scanner::scan;
use crate::story::Story;
use std::sync::Arc;

/// Host-implemented source for `INCLUDE "path"` content. The crate has no
/// opinion on what `path` means (relative file path, module id, URL) —
/// that's entirely up to the embedding host.
pub trait IncludeLoader {
    fn load(&self, path: &str) -> Result<String, IncludeLoadError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IncludeLoadError {
    #[error("include `{0}` not found")]
    NotFound(String),
    #[error("failed to load include `{0}`: {1}")]
    Other(String, String),
}

/// Resolve every pending `INCLUDE` in `story`, recursively, merging loaded
/// passages/variables/collections/functions/namespaces into `story`.
/// Returns diagnostics for unresolved includes, depth-exceeded cutoffs, and
/// cycles; never panics or aborts the merge on a single failed include.
pub fn resolve_includes(story: &mut Story, loader: &dyn IncludeLoader, config: &ParserConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut seen_paths = Vec::new();
    let mut merge_counter = 0usize;
    let pending: Vec<String> = story.includes.iter().map(|i| i.path.clone()).collect();
    for path in pending {
        let before = diagnostics.len();
        resolve_one(story, loader, config, &path, 1, &mut seen_paths, &mut merge_counter, &mut diagnostics);
        let ok = diagnostics.len() == before;
        if let Some(include) = story.includes.iter_mut().find(|i| i.path == path) {
            include.resolved = ok;
        }
    }
    diagnostics
}

#[allow(clippy::too_many_arguments)]
fn resolve_one(
    story: &mut Story,
    loader: &dyn IncludeLoader,
    config: &ParserConfig,
    path: &str,
    depth: u32,
    seen_paths: &mut Vec<String>,
    merge_counter: &mut usize,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if depth > config.max_include_depth {
        diagnostics.push(Diagnostic::error(
            codes::INCLUDE_DEPTH_EXCEEDED,
            format!("include depth exceeded {} while loading `{path}`", config.max_include_depth),
            crate::base::Span::default(),
        ));
        return;
    }
    if seen_paths.iter().any(|p| p == path) {
        diagnostics.push(Diagnostic::error(
            codes::INCLUDE_CYCLE,
            format!("include cycle detected at `{path}`"),
            crate::base::Span::default(),
        ));
        return;
    }

    let content = match loader.load(path) {
        Ok(content) => content,
        Err(err) => {
            diagnostics.push(Diagnostic::error(
                codes::INCLUDE_UNRESOLVED,
                format!("could not resolve include `{path}`: {err}"),
                crate::base::Span::default(),
            ));
            return;
        }
    };

    seen_paths.push(path.to_string());
    let scan_result = scan(&content);
    let included = parse_structural(&content, &scan_result.tokens, config);
    diagnostics.extend(scan_result.diagnostics);

    let nested: Vec<String> = included.includes.iter().map(|i| i.path.clone()).collect();
    merge_into(story, included, merge_counter);

    for nested_path in nested {
        resolve_one(story, loader, config, &nested_path, depth + 1, seen_paths, merge_counter, diagnostics);
    }
    seen_paths.pop();
}

/// Merge an included story's passages/declarations into `story`. Passage
/// ids are regenerated with a merge-local prefix since the included
/// document's own id counter starts at zero and would otherwise collide.
fn merge_into(story: &mut Story, included: Story, merge_counter: &mut usize) {
    *merge_counter += 1;
    let prefix = format!("include_{merge_counter}");

    let mut included = included;
    let variables = std::mem::take(&mut included.variables);
    let lists = std::mem::take(&mut included.lists);
    let arrays = std::mem::take(&mut included.arrays);
    let maps = std::mem::take(&mut included.maps);
    let functions = std::mem::take(&mut included.functions);
    let namespaces = std::mem::take(&mut included.namespaces);
    let extra_diagnostics = std::mem::take(&mut included.diagnostics).into_sorted_vec();

    for mut passage in included.into_passages() {
        let fresh_id: Arc<str> = Arc::from(format!("{prefix}_{}", passage.id).as_str());
        passage.id = fresh_id;
        let _ = story.add_passage(passage);
    }
    for (name, decl) in variables {
        story.variables.entry(name).or_insert(decl);
    }
    for (name, list) in lists {
        story.lists.entry(name).or_insert(list);
    }
    for (name, array) in arrays {
        story.arrays.entry(name).or_insert(array);
    }
    for (name, map) in maps {
        story.maps.entry(name).or_insert(map);
    }
    for (name, function) in functions {
        story.functions.entry(name).or_insert(function);
    }
    for (name, namespace) in namespaces {
        story.namespaces.entry(name).or_insert(namespace);
    }
    story.diagnostics.extend(extra_diagnostics);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::Include;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MapLoader {
        files: HashMap<String, String>,
        loads: RefCell<Vec<String>>,
    }

    impl IncludeLoader for MapLoader {
        fn load(&self, path: &str) -> Result<String, IncludeLoadError> {
            self.loads.borrow_mut().push(path.to_string());
            self.files.get(path).cloned().ok_or_else(|| IncludeLoadError::NotFound(path.to_string()))
        }
    }

    fn parse(src: &str) -> Story {
        let result = scan(src);
        parse_structural(src, &result.tokens, &ParserConfig::default())
    }

    #[test]
    fn merges_included_passages() {
        let mut story = parse(":: Main\nhi\n");
        story.includes.push(Include { path: "extra.wls".to_string(), resolved: false });
        let loader = MapLoader {
            files: HashMap::from([("extra.wls".to_string(), ":: Extra\nmore\n".to_string())]),
            loads: RefCell::new(Vec::new()),
        };
        let diags = resolve_includes(&mut story, &loader, &ParserConfig::default());
        assert!(diags.is_empty());
        assert!(story.passage_by_name("Extra").is_some());
    }

    #[test]
    fn missing_include_emits_diagnostic() {
        let mut story = parse(":: Main\nhi\n");
        story.includes.push(Include { path: "missing.wls".to_string(), resolved: false });
        let loader = MapLoader { files: HashMap::new(), loads: RefCell::new(Vec::new()) };
        let diags = resolve_includes(&mut story, &loader, &ParserConfig::default());
        assert!(diags.iter().any(|d| d.code == codes::INCLUDE_UNRESOLVED));
    }

    #[test]
    fn cyclic_include_is_detected() {
        let mut story = parse(":: Main\nhi\n");
        story.includes.push(Include { path: "a.wls".to_string(), resolved: false });
        let loader = MapLoader {
            files: HashMap::from([("a.wls".to_string(), "INCLUDE \"a.wls\"\n:: A\nhi\n".to_string())]),
            loads: RefCell::new(Vec::new()),
        };
        let diags = resolve_includes(&mut story, &loader, &ParserConfig::default());
        assert!(diags.iter().any(|d| d.code == codes::INCLUDE_CYCLE));
    }
}
