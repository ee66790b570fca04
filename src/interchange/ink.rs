//! Import/export between [`Story`] and the Ink JSON container format
//! (spec.md §4.8).
//!
//! Ink represents a story as a tree of nested JSON arrays ("containers").
//! Each array element is one of: a `^`-prefixed text run, a bare `"\n"`
//! line break, a flow-control object (`{"->": target}` for a divert,
//! `{"->t->": target}` for a tunnel call, `{"<-": ..}` for a thread,
//! `"->->"` for a tunnel return), a choice-point object (`{"*": {..}}` or
//! `{"c": {..}}`), a nested anonymous array (an inline gather/logic block),
//! or a named child container (a knot or stitch, keyed by name) appearing
//! as a map-valued element of the parent array.

use super::InterchangeError;
use crate::base::{Name, Span};
use crate::config::ParserConfig;
use crate::story::{Choice, ChoiceKind, ListCollection, ListValueEntry, Passage, Story};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Choice-point flag bits (spec.md §4.8).
pub const HAS_CONDITION: u32 = 1;
pub const HAS_START_CONTENT: u32 = 2;
pub const HAS_CHOICE_ONLY_CONTENT: u32 = 4;
pub const INVISIBLE_DEFAULT: u32 = 8;
pub const ONCE_ONLY: u32 = 16;

struct CollectedPassage {
    name: String,
    content: String,
    choices: Vec<(String, String, u32)>,
}

/// Parse an Ink JSON document (already deserialized by the host) into a
/// [`Story`]. Runs the semantic validator (C5) over the result so the
/// returned story carries the same post-conditions a structurally-parsed
/// one would.
pub fn import(doc: &Value, config: &ParserConfig) -> Result<Story, InterchangeError> {
    let ink_version = doc.get("inkVersion").and_then(Value::as_u64).ok_or(InterchangeError::MissingField("inkVersion"))?;
    if ink_version < 19 {
        return Err(InterchangeError::UnsupportedVersion(ink_version));
    }
    let root = doc.get("root").and_then(Value::as_array).ok_or(InterchangeError::MalformedRoot)?;

    let start_target = root
        .iter()
        .find_map(|item| item.as_object().and_then(|o| o.get("->")).and_then(Value::as_str).map(str::to_string));

    let mut collected = Vec::new();
    walk(root, "", &mut collected);

    let mut story = Story::new();
    for (index, item) in collected.into_iter().enumerate() {
        let id: Name = Arc::from(format!("ink_{index}_{}", item.name).as_str());
        let source_name = item.name.rsplit("::").next().unwrap_or(&item.name).to_string();
        let mut passage = Passage::new(id, item.name.clone(), source_name, Span::default());
        passage.content = item.content;
        for (text, target, flags) in item.choices {
            let kind = if flags & ONCE_ONLY != 0 { ChoiceKind::Once } else { ChoiceKind::Sticky };
            let condition = if flags & HAS_CONDITION != 0 { Some(String::new()) } else { None };
            passage.choices.push(Choice { text, target, condition, action: None, kind, depth: 1, location: Span::default() });
        }
        let _ = story.add_passage(passage);
    }

    if let Some(defs) = doc.get("listDefs").and_then(Value::as_object) {
        for (list_name, entries_val) in defs {
            let Some(entries_obj) = entries_val.as_object() else { continue };
            let mut entries: Vec<(String, u64)> =
                entries_obj.iter().filter_map(|(k, v)| v.as_u64().map(|idx| (k.clone(), idx))).collect();
            entries.sort_by_key(|(_, idx)| *idx);
            let list = ListCollection {
                name: Arc::from(list_name.as_str()),
                entries: entries.into_iter().map(|(name, _)| ListValueEntry { name: Arc::from(name.as_str()), active: false }).collect(),
            };
            story.lists.insert(Arc::from(list_name.as_str()), list);
        }
    }

    let start_id = start_target
        .as_deref()
        .and_then(|name| story.passage_by_name(name))
        .or_else(|| story.passages().next())
        .map(|p| p.id.clone());
    if let Some(id) = start_id {
        let _ = story.set_start_passage(id);
    }

    let diags = crate::validate::validate(&mut story, config);
    story.diagnostics.extend(diags);
    Ok(story)
}

/// Convenience wrapper over [`import`] for hosts passing raw JSON text.
pub fn import_str(json_text: &str, config: &ParserConfig) -> Result<Story, InterchangeError> {
    let value: Value = serde_json::from_str(json_text)?;
    import(&value, config)
}

/// Recursively walk one Ink container, registering every named
/// knot/stitch/gather it discovers (besides the outermost call, whose
/// `prefix` is empty and whose accumulated content/choices are discarded —
/// the root container itself is not a passage).
fn walk(container: &[Value], prefix: &str, out: &mut Vec<CollectedPassage>) {
    let mut content = String::new();
    let mut choices = Vec::new();
    let mut gather_seq = 0usize;

    for item in container {
        match item {
            Value::String(s) => append_ink_text(s, &mut content),
            Value::Array(nested) => {
                gather_seq += 1;
                let name = format!("{prefix}._gather_{gather_seq}");
                walk(nested, &name, out);
            }
            Value::Object(map) => {
                for (key, value) in map {
                    match key.as_str() {
                        "->" => {
                            if let Some(target) = value.as_str() {
                                content.push_str("\n-> ");
                                content.push_str(target);
                                content.push('\n');
                            }
                        }
                        "->t->" => {
                            if let Some(target) = value.as_str() {
                                content.push_str("\n-> ");
                                content.push_str(target);
                                content.push_str(" ->\n");
                            }
                        }
                        "<-" => content.push_str("\n<-\n"),
                        "*" | "c" => {
                            if let Some(choice_obj) = value.as_object() {
                                let flags = choice_obj.get("flg").and_then(Value::as_u64).unwrap_or(0) as u32;
                                let text = choice_obj.get("text").and_then(Value::as_str).unwrap_or("").to_string();
                                let target = choice_obj.get("target").and_then(Value::as_str).unwrap_or("").to_string();
                                choices.push((text, target, flags));
                            }
                        }
                        other => {
                            if let Some(child) = value.as_array() {
                                let child_name = if prefix.is_empty() { other.to_string() } else { format!("{prefix}::{other}") };
                                walk(child, &child_name, out);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if !prefix.is_empty() {
        out.push(CollectedPassage { name: prefix.to_string(), content: content.trim().to_string(), choices });
    }
}

fn append_ink_text(s: &str, content: &mut String) {
    if let Some(text) = s.strip_prefix('^') {
        content.push_str(text);
    } else if s == "\n" {
        content.push('\n');
    }
}

/// Export `story` to an Ink JSON document (spec.md §4.8).
pub fn export(story: &Story) -> Value {
    let mut tree: Map<String, Value> = Map::new();
    for passage in story.passages() {
        let path: Vec<&str> = passage.qualified_name.split("::").collect();
        insert_into_tree(&mut tree, &path, passage);
    }

    let mut root = Vec::new();
    if let Some(start) = story.start_passage() {
        root.push(json!({ "->": start.qualified_name }));
    }
    for (name, node) in tree {
        root.push(Value::Object(Map::from_iter([(name, node)])));
    }
    root.push(Value::String("done".to_string()));

    let mut obj = Map::new();
    obj.insert("inkVersion".to_string(), json!(20));
    obj.insert("root".to_string(), Value::Array(root));

    if !story.lists.is_empty() {
        let mut defs = Map::new();
        for list in story.lists.values() {
            let mut entries = Map::new();
            for (i, entry) in list.entries.iter().enumerate() {
                entries.insert(entry.name.to_string(), json!((i + 1) as u64));
            }
            defs.insert(list.name.to_string(), Value::Object(entries));
        }
        obj.insert("listDefs".to_string(), Value::Object(defs));
    }

    Value::Object(obj)
}

/// Convenience wrapper over [`export`] producing pretty-printed JSON text.
pub fn export_string(story: &Story) -> Result<String, InterchangeError> {
    serde_json::to_string_pretty(&export(story)).map_err(InterchangeError::from)
}

/// Insert `passage` at `path` (its qualified name split on `::`) into
/// `tree`. A name that already holds a leaf container gets a trailing
/// object appended for its children, so a passage and its `::`-nested
/// children can coexist the way spec.md §4.8 describes ("dotted ids
/// become nested stitches under their parent knot").
fn insert_into_tree(tree: &mut Map<String, Value>, path: &[&str], passage: &Passage) {
    if path.len() == 1 {
        tree.insert(path[0].to_string(), passage_to_container(passage));
        return;
    }
    let entry = tree.entry(path[0].to_string()).or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(arr) = entry {
        let needs_child_map = !matches!(arr.last(), Some(Value::Object(_)));
        if needs_child_map {
            arr.push(Value::Object(Map::new()));
        }
        if let Some(Value::Object(children)) = arr.last_mut() {
            insert_into_tree(children, &path[1..], passage);
        }
    }
}

fn passage_to_container(passage: &Passage) -> Value {
    let mut arr = Vec::new();
    for line in passage.content.split('\n') {
        arr.push(Value::String(format!("^{line}")));
        arr.push(Value::String("\n".to_string()));
    }
    for divert in &passage.diverts {
        arr.push(json!({ "->": divert.target }));
    }
    for call in &passage.tunnel_calls {
        arr.push(json!({ "->t->": call.target }));
    }
    for choice in &passage.choices {
        let mut flags = 0u32;
        if choice.kind == ChoiceKind::Once {
            flags |= ONCE_ONLY;
        }
        if choice.condition.is_some() {
            flags |= HAS_CONDITION;
        }
        arr.push(json!({ "*": { "flg": flags, "text": choice.text, "target": choice.target } }));
    }
    if passage.has_tunnel_return {
        arr.push(Value::String("->->".to_string()));
    }
    for tag in &passage.tags {
        arr.push(Value::String(format!("#{tag}")));
    }
    Value::Array(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_story(passages: &[(&str, &str)]) -> Story {
        let mut story = Story::new();
        for (i, (name, content)) in passages.iter().enumerate() {
            let id: Name = Arc::from(format!("p{i}").as_str());
            let mut passage = Passage::new(id.clone(), name.to_string(), name.to_string(), Span::default());
            passage.content = content.to_string();
            story.add_passage(passage).unwrap();
            if i == 0 {
                story.set_start_passage(id).unwrap();
            }
        }
        story
    }

    #[test]
    fn export_emits_required_shape() {
        let story = plain_story(&[("Start", "hello")]);
        let doc = export(&story);
        assert_eq!(doc["inkVersion"], 20);
        let root = doc["root"].as_array().unwrap();
        assert_eq!(root[0]["->"], "Start");
        assert_eq!(*root.last().unwrap(), Value::String("done".to_string()));
    }

    #[test]
    fn roundtrip_preserves_plain_text_passages() {
        let story = plain_story(&[("Start", "hello world"), ("Next", "more text")]);
        let doc = export(&story);
        let config = ParserConfig::default();
        let imported = import(&doc, &config).unwrap();
        assert_eq!(imported.passage_count(), 2);
        assert_eq!(imported.passage_by_name("Start").unwrap().content, "hello world");
        assert_eq!(imported.passage_by_name("Next").unwrap().content, "more text");
        assert_eq!(imported.start_passage().unwrap().qualified_name, "Start");
    }

    #[test]
    fn import_rejects_old_version() {
        let doc = json!({ "inkVersion": 18, "root": [] });
        let err = import(&doc, &ParserConfig::default()).unwrap_err();
        assert!(matches!(err, InterchangeError::UnsupportedVersion(18)));
    }

    #[test]
    fn import_decodes_choice_flags() {
        let doc = json!({
            "inkVersion": 20,
            "root": [
                { "->": "Start" },
                { "Start": [ "^pick one", "\n", { "*": { "flg": 16, "text": "go", "target": "Next" } } ] },
                { "Next": [ "^the end" ] },
                "done",
            ],
        });
        let story = import(&doc, &ParserConfig::default()).unwrap();
        let start = story.passage_by_name("Start").unwrap();
        assert_eq!(start.choices.len(), 1);
        assert_eq!(start.choices[0].kind, ChoiceKind::Once);
        assert_eq!(start.choices[0].target, "Next");
    }

    #[test]
    fn import_builds_nested_stitches() {
        let doc = json!({
            "inkVersion": 20,
            "root": [
                { "->": "Outer" },
                { "Outer": [ "^outer text", { "Inner": [ "^inner text" ] } ] },
                "done",
            ],
        });
        let story = import(&doc, &ParserConfig::default()).unwrap();
        assert!(story.passage_by_name("Outer").is_some());
        assert!(story.passage_by_name("Outer::Inner").is_some());
    }
}
