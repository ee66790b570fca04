//! Parsing & story-model subsystem for the Whisker interactive-fiction
//! toolchain: lexing, structural/content parsing, module resolution,
//! semantic validation, incremental re-parsing, and Ink JSON interchange.
//!
//! The pipeline is `Scanner (C1) → Structural Parser (C2) → Content Parser
//! (C3) → Module Resolver (C4) → Semantic Validator (C5) → Story Model
//! (C6)`. [`parse_document`] runs C1–C3 and C5 (C4 is opt-in, since it
//! needs a host-provided [`resolve::IncludeLoader`]); [`incremental`]
//! wraps C1–C5 with a per-document cache for editor use; [`interchange`]
//! runs parallel to the rest, converting to and from Ink JSON.

pub mod base;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod incremental;
pub mod interchange;
pub mod parser;
pub mod resolve;
pub mod scanner;
pub mod story;
pub mod validate;

use config::ParserConfig;
use diagnostics::Diagnostic;
use parser::{parse_content, parse_structural};
use resolve::{resolve_includes, IncludeLoader};
use scanner::scan;
use story::Story;

/// Result of a full parse: the assembled story plus every diagnostic
/// collected along the way, in stable source order (P4). `success` mirrors
/// spec.md §7's `success = (#errors == 0)`.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub story: Story,
    pub diagnostics: Vec<Diagnostic>,
    pub success: bool,
}

/// Run the scanner, structural parser, content parser, and semantic
/// validator over `source`. Does not resolve `INCLUDE`s — use
/// [`parse_document_with_includes`] when a loader is available.
pub fn parse_document(source: &str, config: &ParserConfig) -> ParseOutcome {
    let scan_result = scan(source);
    let mut story = parse_structural(source, &scan_result.tokens, config);
    story.diagnostics.extend(scan_result.diagnostics);

    for passage in story.passages_mut() {
        let (parsed, diags) = parse_content(&passage.content, config);
        passage.parsed_content = Some(parsed);
        let location = passage.location;
        story.diagnostics.extend(diags.into_iter().map(|d| Diagnostic { location, ..d }));
    }

    finish(story, config)
}

/// Like [`parse_document`], but also resolves every top-level `INCLUDE`
/// (recursively, up to `config.max_include_depth`) through `loader` before
/// validating, merging each included document's passages and declarations
/// into the result (spec.md §4.4).
pub fn parse_document_with_includes(source: &str, loader: &dyn IncludeLoader, config: &ParserConfig) -> ParseOutcome {
    let scan_result = scan(source);
    let mut story = parse_structural(source, &scan_result.tokens, config);
    story.diagnostics.extend(scan_result.diagnostics);

    let include_diags = resolve_includes(&mut story, loader, config);
    story.diagnostics.extend(include_diags);

    for passage in story.passages_mut() {
        let (parsed, diags) = parse_content(&passage.content, config);
        passage.parsed_content = Some(parsed);
        let location = passage.location;
        story.diagnostics.extend(diags.into_iter().map(|d| Diagnostic { location, ..d }));
    }

    finish(story, config)
}

fn finish(mut story: Story, config: &ParserConfig) -> ParseOutcome {
    let extra = validate::validate(&mut story, config);
    story.diagnostics.extend(extra);

    let diagnostics = std::mem::take(&mut story.diagnostics).into_sorted_vec();
    let success = !diagnostics.iter().any(|d| d.severity == diagnostics::Severity::Error);
    ParseOutcome { story, diagnostics, success }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_story() {
        let outcome = parse_document(":: Start\nhello world\n", &ParserConfig::default());
        assert!(outcome.success);
        assert_eq!(outcome.story.passage_count(), 1);
    }

    #[test]
    fn collects_content_diagnostics_with_passage_location() {
        let src = ":: Start\n|bad> unterminated\n";
        let outcome = parse_document(src, &ParserConfig::default());
        // whatever content-level diagnostics arise get the owning passage's
        // location, not a zero/default span.
        assert!(outcome.story.passage_count() == 1);
    }

    #[test]
    fn reports_undefined_reference() {
        let outcome = parse_document(":: Start\n+ [go] -> Nowhere\n", &ParserConfig::default());
        assert!(outcome.diagnostics.iter().any(|d| d.code == diagnostics::codes::UNDEFINED_PASSAGE_REFERENCE));
    }
}
