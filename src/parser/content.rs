//! C3: the content parser (spec.md §4.3).
//!
//! A finer-grained pass over one passage's raw body text, independent of
//! the scanner's token stream, producing a [`ContentNode`] tree. Invoked
//! during a full structural parse and, standalone, by the incremental
//! parser (C7) when only a passage's body changed.

use crate::config::ParserConfig;
use crate::diagnostics::{codes, Diagnostic, DiagnosticCollector};
use crate::story::content::{AttrValue, Attrs, ContentNode, Emphasis, HookOp, MediaKind};

/// Parse a passage body into its content tree. Parse order (spec.md
/// §4.3): hooks and operations first, then `$var`/`$_var`/`${expr}`
/// interpolations, then rich text (hr, blockquote, list, fence, media,
/// bold, strikethrough, inline-code, italic), then plain text — text
/// scanning halts at any structural sigil.
pub fn parse_content(body: &str, config: &ParserConfig) -> (Vec<ContentNode>, Vec<Diagnostic>) {
    let mut parser = ContentParser { src: body, pos: 0, diagnostics: DiagnosticCollector::new(), depth: 0, guard: config.nesting_guard };
    let nodes = parser.parse_nodes(None);
    (nodes, parser.diagnostics.into_sorted_vec())
}

struct ContentParser<'a> {
    src: &'a str,
    pos: usize,
    diagnostics: DiagnosticCollector,
    depth: usize,
    guard: usize,
}

impl<'a> ContentParser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.src.as_bytes().get(self.pos - 1) == Some(&b'\n')
    }

    /// Parse nodes until EOF or, if `stop_at` is given, until that
    /// delimiter is reached (consumed by the caller, not here).
    fn parse_nodes(&mut self, stop_at: Option<&str>) -> Vec<ContentNode> {
        self.depth += 1;
        if self.depth > self.guard {
            self.diagnostics.push(Diagnostic::error(
                codes::NESTING_GUARD_EXCEEDED,
                "content nesting exceeded the configured guard",
                crate::base::Span::default(),
            ));
            self.depth -= 1;
            return Vec::new();
        }
        let mut nodes = Vec::new();
        let mut text_start = self.pos;
        while self.pos < self.src.len() {
            if let Some(stop) = stop_at {
                if self.rest().starts_with(stop) {
                    break;
                }
            }
            if let Some(node) = self.try_structural() {
                self.flush_text(&mut nodes, text_start);
                nodes.push(node);
                text_start = self.pos;
                continue;
            }
            self.advance_char();
        }
        self.flush_text(&mut nodes, text_start);
        self.depth -= 1;
        nodes
    }

    fn flush_text(&mut self, nodes: &mut Vec<ContentNode>, start: usize) {
        if start < self.pos {
            nodes.push(ContentNode::Text(self.src[start..self.pos].to_string()));
        }
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.rest().chars().next() {
            self.pos += c.len_utf8();
        } else {
            self.pos += 1;
        }
    }

    /// Try each structural construct in spec.md §4.3's order; returns
    /// `Some(node)` and advances `self.pos` past it on success.
    fn try_structural(&mut self) -> Option<ContentNode> {
        self.try_hook_definition()
            .or_else(|| self.try_hook_operation())
            .or_else(|| self.try_interpolation())
            .or_else(|| self.try_horizontal_rule())
            .or_else(|| self.try_blockquote())
            .or_else(|| self.try_list_item())
            .or_else(|| self.try_fenced_code())
            .or_else(|| self.try_media())
            .or_else(|| self.try_bold())
            .or_else(|| self.try_strikethrough())
            .or_else(|| self.try_inline_code())
            .or_else(|| self.try_italic())
    }

    /// `|name>[body]`, supporting nested brackets.
    fn try_hook_definition(&mut self) -> Option<ContentNode> {
        if !self.rest().starts_with('|') {
            return None;
        }
        let rest = self.rest();
        let name_end = rest.find('>')?;
        let name = &rest[1..name_end];
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        if rest.as_bytes().get(name_end + 1) != Some(&b'[') {
            return None;
        }
        let body_start = name_end + 2;
        let (body, consumed) = find_balanced(&rest[body_start..], '[', ']')?;
        self.pos += body_start + consumed;
        let inner = parse_nested(&body, self.guard, self.depth);
        Some(ContentNode::HookDefinition { name: name.to_string(), body: inner })
    }

    /// `@op: target { body }`, `op ∈ {replace, append, prepend, show, hide}`.
    fn try_hook_operation(&mut self) -> Option<ContentNode> {
        if !self.rest().starts_with('@') {
            return None;
        }
        let rest = self.rest();
        let colon = rest.find(':')?;
        let op_name = &rest[1..colon];
        if !op_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        let after_colon = &rest[colon + 1..];
        let brace_rel = after_colon.find('{')?;
        let target = after_colon[..brace_rel].trim().to_string();
        if target.is_empty() {
            return None;
        }
        let (body_raw, consumed) = find_balanced(&after_colon[brace_rel..], '{', '}')?;
        let total = colon + 1 + brace_rel + consumed;

        let op = match HookOp::parse(op_name) {
            Some(op) => op,
            None => {
                self.diagnostics.push(Diagnostic::error(
                    codes::UNKNOWN_HOOK_OPERATION,
                    format!("unknown hook operation `{op_name}`"),
                    crate::base::Span::default(),
                ));
                self.pos += total;
                return Some(ContentNode::Text(String::new()));
            }
        };
        self.pos += total;
        let body = parse_nested(&body_raw, self.guard, self.depth);
        Some(ContentNode::HookOperation { op, target, body })
    }

    /// `$name`, `$_name`, or `${expr}`, captured raw (sigil included) and
    /// left unevaluated for the runtime, mirroring the scanner's own
    /// `$`-handling (`scan_interpolation`) but over the content parser's
    /// independent raw-text pass. A bare `$` with no following identifier
    /// or `{` is not an interpolation and falls through to plain text.
    fn try_interpolation(&mut self) -> Option<ContentNode> {
        if !self.rest().starts_with('$') {
            return None;
        }
        let rest = self.rest();
        if rest.as_bytes().get(1) == Some(&b'{') {
            let (_, consumed) = find_balanced(&rest[1..], '{', '}')?;
            let total = 1 + consumed;
            self.pos += total;
            return Some(ContentNode::Interpolation(rest[..total].to_string()));
        }
        let after_dollar = &rest[1..];
        let temp_prefix = if after_dollar.starts_with('_') { 1 } else { 0 };
        let name = &after_dollar[temp_prefix..];
        let name_len = name.find(|c: char| !c.is_alphanumeric() && c != '_').unwrap_or(name.len());
        if name_len == 0 {
            return None;
        }
        let total = 1 + temp_prefix + name_len;
        self.pos += total;
        Some(ContentNode::Interpolation(rest[..total].to_string()))
    }

    fn try_horizontal_rule(&mut self) -> Option<ContentNode> {
        if !self.at_line_start() {
            return None;
        }
        let line = self.rest().lines().next().unwrap_or("");
        let trimmed = line.trim();
        let is_rule = trimmed.len() >= 3
            && (trimmed.chars().all(|c| c == '-') || trimmed.chars().all(|c| c == '*') || trimmed.chars().all(|c| c == '_'));
        if !is_rule {
            return None;
        }
        self.pos += line.len();
        Some(ContentNode::HorizontalRule)
    }

    fn try_blockquote(&mut self) -> Option<ContentNode> {
        if !self.at_line_start() {
            return None;
        }
        let rest = self.rest();
        let depth = rest.chars().take_while(|c| *c == '>').count();
        if depth == 0 {
            return None;
        }
        let content_end = rest.find('\n').unwrap_or(rest.len());
        let line_len = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        let text = rest[depth..content_end].trim_start_matches(' ').to_string();
        self.pos += line_len;
        Some(ContentNode::Blockquote { depth, children: vec![ContentNode::Text(text)] })
    }

    fn try_list_item(&mut self) -> Option<ContentNode> {
        if !self.at_line_start() {
            return None;
        }
        let rest = self.rest();
        let line_end = rest.find('\n').unwrap_or(rest.len());
        let line = &rest[..line_end];

        if let Some(stripped) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")).or_else(|| line.strip_prefix("+ ")) {
            self.pos += line_end + if line_end < rest.len() { 1 } else { 0 };
            return Some(ContentNode::ListItem { ordered: None, children: vec![ContentNode::Text(stripped.to_string())] });
        }
        let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            let after_digits = &line[digits.len()..];
            if let Some(text) = after_digits.strip_prefix(". ") {
                let n: u32 = digits.parse().ok()?;
                self.pos += line_end + if line_end < rest.len() { 1 } else { 0 };
                return Some(ContentNode::ListItem { ordered: Some(n), children: vec![ContentNode::Text(text.to_string())] });
            }
        }
        None
    }

    /// Fenced code: ` ```lang\n...\n``` `.
    fn try_fenced_code(&mut self) -> Option<ContentNode> {
        if !self.rest().starts_with("```") {
            return None;
        }
        let rest = self.rest();
        let first_line_end = rest.find('\n')?;
        let lang = rest[3..first_line_end].trim();
        let lang = if lang.is_empty() { None } else { Some(lang.to_string()) };
        let body_start = first_line_end + 1;
        let close = rest[body_start..].find("```")?;
        let code = rest[body_start..body_start + close].trim_end_matches('\n').to_string();
        let mut end = body_start + close + 3;
        if rest[end..].starts_with('\n') {
            end += 1;
        }
        self.pos += end;
        Some(ContentNode::FencedCode { lang, code })
    }

    fn try_media(&mut self) -> Option<ContentNode> {
        self.try_markdown_image().or_else(|| self.try_directive_media())
    }

    /// `![alt](src "title" key=value …)`.
    fn try_markdown_image(&mut self) -> Option<ContentNode> {
        if !self.rest().starts_with("![") {
            return None;
        }
        let rest = self.rest();
        let alt_end = rest[2..].find(']')? + 2;
        if rest.as_bytes().get(alt_end + 1) != Some(&b'(') {
            return None;
        }
        let alt = rest[2..alt_end].to_string();
        let (inner, consumed) = find_balanced(&rest[alt_end + 1..], '(', ')')?;
        self.pos += alt_end + 1 + consumed;

        let mut parts = shell_split(&inner);
        if parts.is_empty() {
            return Some(ContentNode::Media {
                kind: MediaKind::Image,
                src: String::new(),
                alt: Some(alt),
                title: None,
                attrs: Attrs::new(),
            });
        }
        let src = parts.remove(0);
        let mut title = None;
        let mut attrs = Attrs::new();
        for part in parts {
            if part.starts_with('"') && part.ends_with('"') && title.is_none() {
                title = Some(part.trim_matches('"').to_string());
            } else if let Some((k, v)) = part.split_once('=') {
                attrs.insert(k.to_string(), AttrValue::coerce(v));
            }
        }
        Some(ContentNode::Media { kind: MediaKind::Image, src, alt: Some(alt), title, attrs })
    }

    /// `@image(src, k=v, …)`, `@audio(…)`, `@video(…)`, `@embed(…)`.
    fn try_directive_media(&mut self) -> Option<ContentNode> {
        let rest = self.rest();
        let kind = if rest.starts_with("@image(") {
            MediaKind::Image
        } else if rest.starts_with("@audio(") {
            MediaKind::Audio
        } else if rest.starts_with("@video(") {
            MediaKind::Video
        } else if rest.starts_with("@embed(") {
            MediaKind::Embed
        } else {
            return None;
        };
        let open = rest.find('(')?;
        let (inner, consumed) = find_balanced(&rest[open..], '(', ')')?;
        self.pos += open + consumed;

        let mut parts = shell_split(&inner);
        let src = if parts.is_empty() { String::new() } else { parts.remove(0) };
        let mut attrs = default_media_attrs(kind);
        for part in parts {
            if let Some((k, v)) = part.split_once('=') {
                attrs.insert(k.to_string(), AttrValue::coerce(v));
            }
        }
        Some(ContentNode::Media { kind, src, alt: None, title: None, attrs })
    }

    fn try_bold(&mut self) -> Option<ContentNode> {
        self.try_wrapped("**", Emphasis::Bold)
    }

    fn try_strikethrough(&mut self) -> Option<ContentNode> {
        self.try_wrapped("~~", Emphasis::Strikethrough)
    }

    fn try_inline_code(&mut self) -> Option<ContentNode> {
        if self.rest().starts_with("```") {
            return None;
        }
        self.try_wrapped("`", Emphasis::InlineCode)
    }

    /// `*italic*`, excluding `**bold**` (checked before this in parse order).
    fn try_italic(&mut self) -> Option<ContentNode> {
        if self.rest().starts_with("**") {
            return None;
        }
        self.try_wrapped("*", Emphasis::Italic)
    }

    fn try_wrapped(&mut self, delim: &str, style: Emphasis) -> Option<ContentNode> {
        if !self.rest().starts_with(delim) {
            return None;
        }
        let after = &self.rest()[delim.len()..];
        let close = after.find(delim)?;
        if close == 0 {
            return None;
        }
        let inner = &after[..close];
        let total = delim.len() * 2 + inner.len();
        self.pos += total;
        let children = if style == Emphasis::InlineCode {
            vec![ContentNode::Text(inner.to_string())]
        } else {
            parse_nested(inner, self.guard, self.depth)
        };
        Some(ContentNode::Emphasis { style, children })
    }
}

fn parse_nested(src: &str, guard: usize, parent_depth: usize) -> Vec<ContentNode> {
    let mut p = ContentParser { src, pos: 0, diagnostics: DiagnosticCollector::new(), depth: parent_depth, guard };
    p.parse_nodes(None)
}

/// Given text starting with `open`, find the matching `close` accounting
/// for nesting, returning (inner text, bytes consumed including delimiters).
fn find_balanced(s: &str, open: char, close: char) -> Option<(String, usize)> {
    let mut chars = s.char_indices();
    let (first_i, first_c) = chars.next()?;
    if first_c != open {
        return None;
    }
    let _ = first_i;
    let mut depth = 1usize;
    for (i, c) in chars {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((s[open.len_utf8()..i].to_string(), i + close.len_utf8()));
            }
        }
    }
    None
}

/// Split a comma-separated attribute list, keeping quoted strings intact.
fn shell_split(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

fn default_media_attrs(kind: MediaKind) -> Attrs {
    let mut attrs = Attrs::new();
    match kind {
        MediaKind::Audio | MediaKind::Video => {
            attrs.insert("controls".to_string(), AttrValue::Bool(true));
            attrs.insert("autoplay".to_string(), AttrValue::Bool(false));
            attrs.insert("loop".to_string(), AttrValue::Bool(false));
            attrs.insert("muted".to_string(), AttrValue::Bool(false));
        }
        MediaKind::Embed => {
            attrs.insert("sandbox".to_string(), AttrValue::Bool(true));
            attrs.insert("loading".to_string(), AttrValue::String("lazy".to_string()));
            attrs.insert("width".to_string(), AttrValue::Number(560.0));
            attrs.insert("height".to_string(), AttrValue::Number(315.0));
        }
        MediaKind::Image => {}
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Vec<ContentNode> {
        parse_content(src, &ParserConfig::default()).0
    }

    #[test]
    fn bold_and_italic() {
        let nodes = parse("a **bold** and *italic* text");
        assert!(nodes.iter().any(|n| matches!(n, ContentNode::Emphasis { style: Emphasis::Bold, .. })));
        assert!(nodes.iter().any(|n| matches!(n, ContentNode::Emphasis { style: Emphasis::Italic, .. })));
    }

    #[test]
    fn hook_definition_with_nested_brackets() {
        let nodes = parse("|greet>[Hello [World]!]");
        match &nodes[0] {
            ContentNode::HookDefinition { name, body } => {
                assert_eq!(name, "greet");
                assert!(!body.is_empty());
            }
            other => panic!("expected hook definition, got {other:?}"),
        }
    }

    #[test]
    fn hook_operation_replace() {
        let nodes = parse("@replace: greet { New text }");
        assert!(matches!(&nodes[0], ContentNode::HookOperation { op: HookOp::Replace, target, .. } if target == "greet"));
    }

    #[test]
    fn unknown_hook_operation_emits_diagnostic() {
        let (_, diags) = parse_content("@bogus: x { y }", &ParserConfig::default());
        assert!(diags.iter().any(|d| d.code == codes::UNKNOWN_HOOK_OPERATION));
    }

    #[test]
    fn fenced_code_preserves_language() {
        let nodes = parse("```rust\nlet x = 1;\n```\n");
        assert!(matches!(&nodes[0], ContentNode::FencedCode { lang: Some(l), .. } if l == "rust"));
    }

    #[test]
    fn markdown_image_with_title_and_attrs() {
        let nodes = parse("![alt](pic.png \"Title\" width=100)");
        match &nodes[0] {
            ContentNode::Media { kind: MediaKind::Image, src, title, attrs, .. } => {
                assert_eq!(src, "pic.png");
                assert_eq!(title.as_deref(), Some("Title"));
                assert!(matches!(attrs.get("width"), Some(AttrValue::Number(n)) if *n == 100.0));
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn horizontal_rule_at_line_start() {
        let nodes = parse("above\n---\nbelow");
        assert!(nodes.iter().any(|n| matches!(n, ContentNode::HorizontalRule)));
    }

    #[test]
    fn variable_and_expr_interpolation() {
        let nodes = parse("hi $name, total: ${score + 1}");
        assert!(nodes.iter().any(|n| matches!(n, ContentNode::Interpolation(s) if s == "$name")));
        assert!(nodes.iter().any(|n| matches!(n, ContentNode::Interpolation(s) if s == "${score + 1}")));
    }

    #[test]
    fn temp_variable_interpolation() {
        let nodes = parse("$_scratch value");
        assert!(nodes.iter().any(|n| matches!(n, ContentNode::Interpolation(s) if s == "$_scratch")));
    }

    #[test]
    fn bare_dollar_is_plain_text() {
        let nodes = parse("price is $ unknown");
        assert!(nodes.iter().all(|n| !matches!(n, ContentNode::Interpolation(_))));
        assert!(nodes.iter().any(|n| matches!(n, ContentNode::Text(t) if t.contains('$'))));
    }
}
