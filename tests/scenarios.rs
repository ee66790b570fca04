//! End-to-end scenarios (spec.md §8 "End-to-end scenarios").

use once_cell::sync::Lazy;
use rstest::rstest;
use whisker::base::LineCol;
use whisker::config::ParserConfig;
use whisker::diagnostics::codes;
use whisker::incremental::{ChangeRange, DocumentCache, TextChange};
use whisker::story::ChoiceKind;
use whisker::{parse_document, parse_document_with_includes};

/// The canonical-UUID fix suggestion every `INVALID_IFID` diagnostic
/// carries; precomputed once rather than re-literaled at each call site.
static IFID_SUGGESTION_MASK: Lazy<&str> = Lazy::new(|| "XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX");

fn lc(line: u32, col: u32) -> LineCol {
    LineCol { line, col }
}

/// One fixture per diagnostic code (spec.md §2 ambient test-tooling intent):
/// a minimal source snippet known to trigger exactly that code.
#[rstest]
#[case(":: Start\n+ [Go] -> Missing\n", codes::UNDEFINED_PASSAGE_REFERENCE)]
#[case(":: A\nfirst\n:: A\nsecond\n", codes::DUPLICATE_PASSAGE)]
#[case("@ifid: not-a-uuid\n:: Start\nhi\n", codes::INVALID_IFID)]
#[case("@setting: bogus_key = 1\n:: Start\nhi\n", codes::UNKNOWN_SETTING_KEY)]
#[case(":: Start\nhi\n:: Island\nalone\n", codes::ORPHAN_PASSAGE)]
fn diagnostic_code_fixtures(#[case] source: &str, #[case] expected_code: &str) {
    let outcome = parse_document(source, &ParserConfig::default());
    assert!(
        outcome.diagnostics.iter().any(|d| d.code == expected_code),
        "expected {expected_code} from source {source:?}, got {:?}",
        outcome.diagnostics.iter().map(|d| d.code).collect::<Vec<_>>()
    );
}

#[test]
fn scenario_1_choice_with_escaped_brackets() {
    let outcome = parse_document(":: Start\n+ [He said \\[hello\\]] -> Next\n:: Next\nOk.\n", &ParserConfig::default());
    assert!(outcome.success);
    let start = outcome.story.passage_by_name("Start").unwrap();
    assert_eq!(start.choices.len(), 1);
    assert_eq!(start.choices[0].text, "He said [hello]");
    assert_eq!(start.choices[0].target, "Next");
    assert_eq!(start.choices[0].kind, ChoiceKind::Once);
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn scenario_2_dangling_reference() {
    let outcome = parse_document(":: Start\n+ [Go] -> Missing\n", &ParserConfig::default());
    assert_eq!(outcome.story.passage_count(), 1);
    let start = outcome.story.passage_by_name("Start").unwrap();
    assert_eq!(start.choices.len(), 1);
    assert_eq!(start.choices[0].target, "Missing");
    let refs: Vec<_> = outcome.diagnostics.iter().filter(|d| d.code == codes::UNDEFINED_PASSAGE_REFERENCE).collect();
    assert_eq!(refs.len(), 1);
}

#[test]
fn scenario_3_duplicate_passage() {
    let outcome = parse_document(":: A\nfirst\n:: A\nsecond\n", &ParserConfig::default());
    assert_eq!(outcome.story.passage_count(), 2);
    let dupes: Vec<_> = outcome.diagnostics.iter().filter(|d| d.code == codes::DUPLICATE_PASSAGE).collect();
    assert_eq!(dupes.len(), 1);
    // first occurrence stays canonical under passage_by_name
    assert_eq!(outcome.story.passage_by_name("A").unwrap().content, "first");
}

#[test]
fn scenario_4_incremental_edit_within_one_passage() {
    let cache = DocumentCache::new(ParserConfig::default());
    let initial = ":: A\nhello\n:: B\nworld\n";
    cache.parse_document("doc", initial);
    let before = cache.get("doc").unwrap();
    let b_before = before.passage_by_name("B").unwrap().clone();

    let changes =
        vec![TextChange { range: Some(ChangeRange { start: lc(1, 0), end: lc(1, 5) }), text: "hi".to_string() }];
    let updated_content = ":: A\nhi\n:: B\nworld\n";
    let after = cache.update_document("doc", &changes, updated_content).unwrap();

    assert_eq!(after.passage_by_name("A").unwrap().content, "hi");
    let b_after = after.passage_by_name("B").unwrap();
    assert_eq!(b_after, &b_before);

    let full_reparse = parse_document(updated_content, &ParserConfig::default()).story;
    assert_eq!(after.passage_by_name("A").unwrap().content, full_reparse.passage_by_name("A").unwrap().content);
    assert_eq!(after.passage_by_name("B").unwrap().content, full_reparse.passage_by_name("B").unwrap().content);
}

#[test]
fn scenario_5_tunnel_call_and_return() {
    let outcome = parse_document(":: Main\n-> Sub ->\nafter\n:: Sub\ndetour\n<-\n", &ParserConfig::default());
    let main = outcome.story.passage_by_name("Main").unwrap();
    assert_eq!(main.tunnel_calls.len(), 1);
    assert_eq!(main.tunnel_calls[0].target, "Sub");
    assert_eq!(main.tunnel_calls[0].position, 1);
    let sub = outcome.story.passage_by_name("Sub").unwrap();
    assert!(sub.has_tunnel_return);
    assert!(!outcome.diagnostics.iter().any(|d| d.code.starts_with("WLS-REF")));
}

#[test]
fn scenario_6_ifid_validation() {
    let outcome = parse_document("@ifid: not-a-uuid\n:: Start\nhi\n", &ParserConfig::default());
    assert_eq!(outcome.story.metadata.ifid.as_deref(), Some("not-a-uuid"));
    assert!(outcome.story.metadata.ifid_invalid);
    let warnings: Vec<_> = outcome.diagnostics.iter().filter(|d| d.code == codes::INVALID_IFID).collect();
    assert_eq!(warnings.len(), 1);
    let suggestion = warnings[0].suggestion.as_deref().unwrap();
    assert_eq!(suggestion, *IFID_SUGGESTION_MASK);
}

struct NoopLoader;

impl whisker::resolve::IncludeLoader for NoopLoader {
    fn load(&self, path: &str) -> Result<String, whisker::resolve::IncludeLoadError> {
        Err(whisker::resolve::IncludeLoadError::NotFound(path.to_string()))
    }
}

#[test]
fn parse_document_with_includes_reports_unresolved_include() {
    let outcome =
        parse_document_with_includes("INCLUDE \"missing.wls\"\n:: Start\nhi\n", &NoopLoader, &ParserConfig::default());
    assert!(outcome.diagnostics.iter().any(|d| d.code == codes::INCLUDE_UNRESOLVED));
}
