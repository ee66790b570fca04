//! Testable properties (spec.md §8 "Testable properties" P1-P6, plus the
//! idempotence properties listed alongside them).

use whisker::config::ParserConfig;
use whisker::incremental::{ChangeRange, DocumentCache, TextChange};
use whisker::interchange::{compare, export, import};
use whisker::parse_document;
use whisker::scanner::scan;

const SOURCE: &str = ":: Start\nHello $name.\n+ [Go] -> Next\n:: Next\n-> Sub ->\nback\n:: Sub\ndetour\n<-\n";

/// P1: every byte of the source is accounted for by exactly one token's
/// span or by trivia (whitespace/comments) the scanner silently skips —
/// tokens never drop or duplicate source bytes.
#[test]
fn p1_tokens_cover_the_source_without_overlap() {
    let result = scan(SOURCE);
    let mut last_end = 0usize;
    for tok in &result.tokens {
        assert!(tok.position >= last_end, "token at {} overlaps previous token ending at {}", tok.position, last_end);
        last_end = tok.position + tok.text.len();
    }
    assert!(last_end <= SOURCE.len());
}

/// P2: every passage in a parsed story has a unique id.
#[test]
fn p2_passage_ids_are_unique() {
    let outcome = parse_document(SOURCE, &ParserConfig::default());
    let mut ids: Vec<_> = outcome.story.passage_ids().collect();
    let before = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), before);
}

/// P3: incrementally updating only within one passage's body yields a
/// story equivalent (per passage) to a full reparse of the same final text.
#[test]
fn p3_incremental_update_matches_full_reparse() {
    let cache = DocumentCache::new(ParserConfig::default());
    let initial = ":: A\nhello\n:: B\nworld\n";
    cache.parse_document("doc", initial);

    let changes =
        vec![TextChange { range: Some(ChangeRange { start: lc(1, 0), end: lc(1, 5) }), text: "howdy".to_string() }];
    let updated = ":: A\nhowdy\n:: B\nworld\n";
    let incremental = cache.update_document("doc", &changes, updated).unwrap();
    let full = parse_document(updated, &ParserConfig::default()).story;

    assert_eq!(incremental.passage_count(), full.passage_count());
    for passage in full.passages() {
        let other = incremental.passage_by_name(&passage.qualified_name).unwrap();
        assert_eq!(other.content, passage.content);
    }
}

/// P4: diagnostics are always produced in ascending (line, column) order.
#[test]
fn p4_diagnostics_are_sorted_by_position() {
    let src = ":: Start\n+ [a] -> Missing2\n+ [b] -> Missing1\n";
    let outcome = parse_document(src, &ParserConfig::default());
    let mut prev = (0usize, 0usize);
    for d in &outcome.diagnostics {
        let key = (d.location.start.line, d.location.start.column);
        assert!(key >= prev, "diagnostic out of order: {key:?} came after {prev:?}");
        prev = key;
    }
    assert!(outcome.diagnostics.len() >= 2);
}

/// P5: reference validation is a closure over every reachable target —
/// a chain of choice -> tunnel -> divert targets is fully checked, not
/// just the first hop.
#[test]
fn p5_reference_validation_is_closed_over_the_whole_chain() {
    let src = ":: Start\n+ [Go] -> Mid\n:: Mid\n-> Gone\n";
    let outcome = parse_document(src, &ParserConfig::default());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.code == whisker::diagnostics::codes::UNDEFINED_PASSAGE_REFERENCE));
}

/// P6: for a story built only of named passages and plain-text content (no
/// choices, tunnels, or diverts), `import(export(S))` yields a story with
/// an identical passage set and identical (whitespace-normalized) content.
#[test]
fn p6_plain_text_story_round_trips_through_ink_interchange() {
    let source = ":: Start\nWelcome to the story.\n:: Middle\nSomething happens here.\n:: End\nThe end.\n";
    let original = parse_document(source, &ParserConfig::default()).story;

    let doc = export(&original);
    let reimported = import(&doc, &ParserConfig::default()).unwrap();

    let diffs = compare(&original, &reimported);
    let non_trivial: Vec<_> = diffs
        .iter()
        .filter(|d| !matches!(d, whisker::interchange::Difference::StartMismatch { .. }))
        .collect();
    assert!(non_trivial.is_empty(), "unexpected round-trip differences: {non_trivial:?}");
}

/// Idempotence: parsing the same source twice through the same cache key
/// produces equivalent stories.
#[test]
fn idempotence_reparsing_the_same_document_is_stable() {
    let cache = DocumentCache::new(ParserConfig::default());
    let first = cache.parse_document("doc", SOURCE);
    let second = cache.parse_document("doc", SOURCE);
    assert_eq!(first.passage_count(), second.passage_count());
    for p in first.passages() {
        let other = second.passage_by_name(&p.qualified_name).unwrap();
        assert_eq!(other.content, p.content);
    }
}

/// Idempotence: an empty change list against an unchanged document is a
/// no-op — the resulting story is equivalent to the cached one.
#[test]
fn idempotence_empty_change_list_is_a_no_op() {
    let cache = DocumentCache::new(ParserConfig::default());
    cache.parse_document("doc", SOURCE);
    let before = cache.get("doc").unwrap();
    let after = cache.update_document("doc", &[], SOURCE).unwrap();
    assert_eq!(before.passage_count(), after.passage_count());
    for p in before.passages() {
        let other = after.passage_by_name(&p.qualified_name).unwrap();
        assert_eq!(other.content, p.content);
    }
}

/// Identical stories compared against themselves yield no differences —
/// the comparator's own baseline correctness property (spec.md §4.8).
#[test]
fn compare_identical_stories_yields_no_differences() {
    let story = parse_document(SOURCE, &ParserConfig::default()).story;
    let diffs = compare(&story, &story);
    assert!(diffs.is_empty());
}

fn lc(line: u32, col: u32) -> whisker::base::LineCol {
    whisker::base::LineCol { line, col }
}
