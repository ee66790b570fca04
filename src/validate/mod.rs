//! C5: the semantic validator (spec.md §4.5).
//!
//! Runs after C2–C4 over a fully assembled [`Story`], producing warnings
//! (never hard failures — the Story model is always returned, per spec.md
//! §7). Reference validation and orphan detection are the two checks with
//! host-visible fallout; the rest guard metadata quality.

use crate::base::constants;
use crate::config::ParserConfig;
use crate::diagnostics::{codes, Diagnostic};
use crate::story::{Story, VarType};
use rustc_hash::FxHashSet;

/// Validate `story`, returning every diagnostic found. Does not mutate the
/// story or its existing `diagnostics` collector — callers append the
/// result themselves (so a caller can choose to re-validate without
/// accumulating duplicates).
pub fn validate(story: &mut Story, config: &ParserConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    validate_references(story, &mut out);
    validate_ifid(story, &mut out);
    validate_header_directives(story, &mut out);
    validate_settings(story, &mut out);
    validate_variables(story, &mut out);
    validate_orphans(story, &mut out);
    let _ = config;
    out
}

/// For every choice target, tunnel call, and divert target, confirm a
/// passage with that qualified name exists (reserved targets exempt).
fn validate_references(story: &Story, out: &mut Vec<Diagnostic>) {
    for passage in story.passages() {
        for choice in &passage.choices {
            check_target(story, &choice.target, choice.location, out);
        }
        for call in &passage.tunnel_calls {
            check_target(story, &call.target, passage.location, out);
        }
        for divert in &passage.diverts {
            check_target(story, &divert.target, divert.location, out);
        }
    }
}

fn check_target(story: &Story, target: &str, location: crate::base::Span, out: &mut Vec<Diagnostic>) {
    if target.is_empty() || constants::is_reserved_target(target) {
        return;
    }
    if story.passage_by_name(target).is_none() {
        out.push(Diagnostic::warning(
            codes::UNDEFINED_PASSAGE_REFERENCE,
            format!("reference to undefined passage `{target}`"),
            location,
        ));
    }
}

/// IFID must match the canonical UUID format (v4 preferred); invalid
/// values are stored leniently (`metadata.ifid_invalid` flags them) but
/// still surfaced as a diagnostic with the canonical UUID mask as a fix
/// suggestion.
fn validate_ifid(story: &mut Story, out: &mut Vec<Diagnostic>) {
    let Some(ifid) = story.metadata.ifid.clone() else {
        return;
    };
    let valid = is_canonical_uuid(&ifid);
    story.metadata.ifid_invalid = !valid;
    if !valid {
        out.push(
            Diagnostic::warning(codes::INVALID_IFID, format!("IFID `{ifid}` is not a canonical UUID"), crate::base::Span::default())
                .with_suggestion("XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX"),
        );
    }
}

fn is_canonical_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

/// Every recognized header directive (`@title`, `@author`, …) lands in a
/// dedicated `metadata` field during parsing; anything else is stashed in
/// `metadata.extra` and warned on here against
/// [`constants::RECOGNIZED_HEADER_DIRECTIVES`] (spec.md §3 "Header").
fn validate_header_directives(story: &Story, out: &mut Vec<Diagnostic>) {
    for key in story.metadata.extra.keys() {
        if !constants::RECOGNIZED_HEADER_DIRECTIVES.contains(&key.as_str()) {
            out.push(Diagnostic::warning(
                codes::UNKNOWN_HEADER_DIRECTIVE,
                format!("unknown header directive `@{key}`"),
                crate::base::Span::default(),
            ));
        }
    }
}

/// Type-check each `@setting` key against the recognized schema; unknown
/// keys rejected (spec.md §3, §4.5).
fn validate_settings(story: &Story, out: &mut Vec<Diagnostic>) {
    for raw in &story.raw_settings {
        if !constants::RECOGNIZED_SETTINGS_KEYS.contains(&raw.key.as_str()) {
            out.push(Diagnostic::warning(
                codes::UNKNOWN_SETTING_KEY,
                format!("unknown setting key `{}`", raw.key),
                raw.location,
            ));
            continue;
        }
        let valid = match raw.key.as_str() {
            "tunnel_limit" | "max_include_depth" => raw.value.parse::<u32>().is_ok(),
            "random_seed" => raw.value.parse::<i64>().is_ok(),
            "strict_mode" | "strict_hooks" | "debug" => raw.value == "true" || raw.value == "false",
            "choice_fallback" => crate::story::ChoiceFallback::parse(&raw.value).is_some(),
            "end_text" | "continue_text" => true,
            _ => true,
        };
        if !valid {
            out.push(Diagnostic::warning(
                codes::INVALID_SETTING_VALUE,
                format!("invalid value `{}` for setting `{}`", raw.value, raw.key),
                raw.location,
            ));
        }
    }
}

/// Declared type must be one of the recognized tags; if a default is
/// present its dynamic type must match the declared type.
fn validate_variables(story: &Story, out: &mut Vec<Diagnostic>) {
    for decl in story.variables.values() {
        if decl.var_type == VarType::Invalid {
            out.push(Diagnostic::warning(
                codes::INVALID_VARIABLE_TYPE,
                format!("variable `{}` has an invalid declared type", decl.name),
                crate::base::Span::default(),
            ));
            continue;
        }
        let actual = VarType::of(&decl.default);
        if actual != decl.var_type && actual != VarType::Invalid {
            out.push(Diagnostic::warning(
                codes::VARIABLE_TYPE_MISMATCH,
                format!("variable `{}` declared as {:?} but default is {:?}", decl.name, decl.var_type, actual),
                crate::base::Span::default(),
            ));
        }
    }
}

/// Reachability from the start passage through choice/tunnel/divert
/// targets; unreached passages are orphans (spec.md §4.5, interchange-side
/// per the spec but implemented here since it only needs the Story).
fn validate_orphans(story: &Story, out: &mut Vec<Diagnostic>) {
    let Some(start) = story.start_passage_id().cloned() else {
        return;
    };
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        let Some(passage) = story.passage(&id) else { continue };
        if !seen.insert(passage.qualified_name.clone()) {
            continue;
        }
        for target in passage.referenced_targets() {
            if constants::is_reserved_target(target) {
                continue;
            }
            if let Some(next) = story.passage_by_name(target) {
                stack.push(next.id.clone());
            }
        }
    }
    for passage in story.passages() {
        if !seen.contains(&passage.qualified_name) {
            out.push(Diagnostic::warning(
                codes::ORPHAN_PASSAGE,
                format!("passage `{}` is not reachable from the start passage", passage.qualified_name),
                passage.location,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_structural;
    use crate::scanner::scan;

    fn parse(src: &str) -> Story {
        let result = scan(src);
        parse_structural(src, &result.tokens, &ParserConfig::default())
    }

    #[test]
    fn undefined_reference_is_flagged() {
        let mut story = parse(":: Start\n+ [go] -> Nowhere\n");
        let diags = validate(&mut story, &ParserConfig::default());
        assert!(diags.iter().any(|d| d.code == codes::UNDEFINED_PASSAGE_REFERENCE));
    }

    #[test]
    fn reserved_target_is_exempt() {
        let mut story = parse(":: Start\n+ [go] -> END\n");
        let diags = validate(&mut story, &ParserConfig::default());
        assert!(!diags.iter().any(|d| d.code == codes::UNDEFINED_PASSAGE_REFERENCE));
    }

    #[test]
    fn invalid_ifid_is_flagged() {
        let mut story = parse("@ifid: not-a-uuid\n:: Start\nhi\n");
        let diags = validate(&mut story, &ParserConfig::default());
        assert!(diags.iter().any(|d| d.code == codes::INVALID_IFID));
        assert!(story.metadata.ifid_invalid);
        assert!(diags.iter().find(|d| d.code == codes::INVALID_IFID).unwrap().suggestion.is_some());
    }

    #[test]
    fn valid_ifid_passes() {
        let mut story = parse("@ifid: 550E8400-E29B-41D4-A716-446655440000\n:: Start\nhi\n");
        let diags = validate(&mut story, &ParserConfig::default());
        assert!(!diags.iter().any(|d| d.code == codes::INVALID_IFID));
        assert!(!story.metadata.ifid_invalid);
    }

    #[test]
    fn unknown_header_directive_is_flagged() {
        let mut story = parse("@publisher: Acme\n:: Start\nhi\n");
        let diags = validate(&mut story, &ParserConfig::default());
        assert!(diags.iter().any(|d| d.code == codes::UNKNOWN_HEADER_DIRECTIVE));
    }

    #[test]
    fn recognized_header_directive_is_not_flagged() {
        let mut story = parse("@title: My Story\n:: Start\nhi\n");
        let diags = validate(&mut story, &ParserConfig::default());
        assert!(!diags.iter().any(|d| d.code == codes::UNKNOWN_HEADER_DIRECTIVE));
    }

    #[test]
    fn unknown_setting_key_is_flagged() {
        let mut story = parse("@setting: bogus_key = 1\n:: Start\nhi\n");
        let diags = validate(&mut story, &ParserConfig::default());
        assert!(diags.iter().any(|d| d.code == codes::UNKNOWN_SETTING_KEY));
    }

    #[test]
    fn orphan_passage_is_flagged() {
        let mut story = parse(":: Start\nhi\n:: Island\nalone\n");
        let start_id = story.passage_by_name("Start").unwrap().id.clone();
        story.set_start_passage(start_id).unwrap();
        let diags = validate(&mut story, &ParserConfig::default());
        assert!(diags.iter().any(|d| d.code == codes::ORPHAN_PASSAGE));
    }
}
