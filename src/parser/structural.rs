//! C2: the structural parser (spec.md §4.2).
//!
//! Assembles the [`Story`] skeleton from the scanner's token stream: the
//! header, `@vars`, declarations (`LIST`/`ARRAY`/`MAP`/`INCLUDE`/
//! `FUNCTION`/`NAMESPACE`/`THEME`/`STYLE`), and passages with their
//! choices, gathers, and tunnel calls.

use super::cursor::Cursor;
use crate::base::{Interner, Name, Position, Span};
use crate::config::ParserConfig;
use crate::diagnostics::{codes, Diagnostic};
use crate::scanner::{Token, TokenKind};
use crate::story::*;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::trace;

/// Run the structural parser over `source`'s token stream, producing a
/// `Story` skeleton (passages, choices, gathers, tunnels, declarations).
/// C3 (content parsing), C4 (module resolution), and C5 (validation) run
/// afterward over the result.
pub fn parse_structural(source: &str, tokens: &[Token], _config: &ParserConfig) -> Story {
    let mut parser = StructuralParser {
        cursor: Cursor::new(source, tokens),
        story: Story::new(),
        namespace_stack: Vec::new(),
        passage_counter: 0,
        interner: Interner::new(),
    };
    parser.run();
    parser.story
}

struct StructuralParser<'a> {
    cursor: Cursor<'a>,
    story: Story,
    /// Simple (unqualified) namespace names currently open, innermost last.
    namespace_stack: Vec<String>,
    passage_counter: usize,
    interner: Interner,
}

impl<'a> StructuralParser<'a> {
    fn intern(&mut self, s: &str) -> Name {
        self.interner.intern(s)
    }

    fn position_of(&self, byte_pos: usize) -> Position {
        let (line_start, _) = self.cursor.line_bounds(byte_pos);
        let line = self.cursor.source[..line_start].matches('\n').count() + 1;
        let column = byte_pos - line_start + 1;
        Position::new(line, column)
    }

    fn push_error(&mut self, code: &'static str, message: impl Into<String>, byte_pos: usize) {
        let pos = self.position_of(byte_pos);
        self.story.diagnostics.push(Diagnostic::error(code, message, Span::point(pos)));
    }

    fn push_warning(&mut self, code: &'static str, message: impl Into<String>, byte_pos: usize) {
        let pos = self.position_of(byte_pos);
        self.story.diagnostics.push(Diagnostic::warning(code, message, Span::point(pos)));
    }

    fn namespace_prefix_colon(&self) -> Option<String> {
        if self.namespace_stack.is_empty() {
            None
        } else {
            Some(self.namespace_stack.join("::"))
        }
    }

    fn namespace_prefix_dot(&self) -> Option<String> {
        if self.namespace_stack.is_empty() {
            None
        } else {
            Some(self.namespace_stack.join("."))
        }
    }

    fn run(&mut self) {
        self.parse_preamble();
        self.parse_passages();
        if !self.namespace_stack.is_empty() {
            trace!(open = self.namespace_stack.len(), "namespaces left unclosed at EOF");
        }
        self.resolve_start_passage();
    }

    /// `@start` if given, else the passage named "Start", else the first
    /// declared passage (spec.md §4.2).
    fn resolve_start_passage(&mut self) {
        let id = self
            .story
            .metadata
            .start
            .as_deref()
            .and_then(|name| self.story.passage_by_name(name))
            .or_else(|| self.story.passage_by_name("Start"))
            .or_else(|| self.story.passages().next())
            .map(|p| p.id.clone());
        if let Some(id) = id {
            let _ = self.story.set_start_passage(id);
        }
    }

    // ---- Preamble: header, @vars, declarations ----------------------

    fn parse_preamble(&mut self) {
        loop {
            self.cursor.skip_trivia();
            match self.cursor.peek_kind() {
                TokenKind::Directive => self.parse_directive(),
                TokenKind::VarsStart => self.parse_vars_block(),
                TokenKind::ListKw => self.parse_list_decl(),
                TokenKind::ArrayKw => self.parse_array_decl(),
                TokenKind::MapKw => self.parse_map_decl(),
                TokenKind::IncludeKw => self.parse_include_decl(),
                TokenKind::FunctionKw => self.parse_function_decl(),
                TokenKind::NamespaceKw => self.parse_namespace_open(),
                TokenKind::EndKw => self.parse_end_keyword(),
                TokenKind::ThemeKw => self.parse_theme_decl(),
                TokenKind::StyleKw => self.parse_style_decl(),
                TokenKind::PassageMarker | TokenKind::Eof => break,
                _ => {
                    self.cursor.skip_to_next_line();
                }
            }
        }
    }

    fn parse_directive(&mut self) {
        let tok = self.cursor.bump();
        let (name, value) = match tok.text.split_once(':') {
            Some((n, v)) => (n.trim().to_string(), v.trim().to_string()),
            None => (tok.text.trim().to_string(), String::new()),
        };
        trace!(%name, "header directive");
        match name.as_str() {
            "title" => self.story.metadata.title = Some(value),
            "author" => self.story.metadata.author = Some(value),
            "version" => self.story.metadata.version = Some(value),
            "ifid" => self.story.metadata.ifid = Some(value),
            "start" => self.story.metadata.start = Some(value),
            "description" => self.story.metadata.description = Some(value),
            "created" => self.story.metadata.created = Some(value),
            "modified" => self.story.metadata.modified = Some(value),
            "theme" => self.story.metadata.theme = Some(value.clone()),
            "fallback" => self.story.metadata.fallback = Some(value),
            "seed" => self.story.metadata.seed = Some(value),
            "var" => self.parse_var_directive(&value, tok.position),
            "setting" => self.parse_setting_directive(&value, tok.position),
            other => {
                self.story.metadata.extra.insert(other.to_string(), value);
            }
        }
    }

    /// `@var: name = expr` (spec.md §4.2 step 1).
    fn parse_var_directive(&mut self, value: &str, byte_pos: usize) {
        let Some((name, expr)) = value.split_once('=') else {
            self.push_error(codes::MISSING_EQUALS, "`@var` directive requires `name = value`", byte_pos);
            return;
        };
        let name = name.trim();
        let value = Value::parse_literal(expr.trim());
        let var_type = VarType::of(&value);
        let name = self.intern(name);
        self.story.variables.insert(
            name.clone(),
            VariableDecl { name, var_type, default: value, list_values: None },
        );
    }

    /// `@setting: key = value` (spec.md §3 "Settings"). Applied best-effort
    /// to the typed `Settings` here; the raw pair is kept for the validator
    /// to check against the recognized schema (spec.md §4.5).
    fn parse_setting_directive(&mut self, value: &str, byte_pos: usize) {
        let Some((key, val)) = value.split_once('=') else {
            self.push_error(codes::MISSING_EQUALS, "`@setting` directive requires `key = value`", byte_pos);
            return;
        };
        let key = key.trim().to_string();
        let val = val.trim().to_string();
        let pos = self.position_of(byte_pos);
        self.story.raw_settings.push(RawSetting { key: key.clone(), value: val.clone(), location: Span::point(pos) });

        match key.as_str() {
            "tunnel_limit" => {
                if let Ok(n) = val.parse() {
                    self.story.settings.tunnel_limit = n;
                }
            }
            "choice_fallback" => {
                if let Some(f) = ChoiceFallback::parse(&val) {
                    self.story.settings.choice_fallback = f;
                }
            }
            "random_seed" => self.story.settings.random_seed = val.parse().ok(),
            "strict_mode" => self.story.settings.strict_mode = val == "true",
            "strict_hooks" => self.story.settings.strict_hooks = val == "true",
            "debug" => self.story.settings.debug = val == "true",
            "end_text" => self.story.settings.end_text = val.trim_matches('"').to_string(),
            "continue_text" => self.story.settings.continue_text = val.trim_matches('"').to_string(),
            "max_include_depth" => {
                if let Ok(n) = val.parse() {
                    self.story.settings.max_include_depth = n;
                }
            }
            _ => {}
        }
    }

    /// `@vars` block: indented `name: value` lines, one variable each.
    fn parse_vars_block(&mut self) {
        self.cursor.bump(); // VARS_START
        self.cursor.skip_trivia();
        loop {
            let byte_pos = self.cursor.byte_pos();
            if byte_pos >= self.cursor.source_end() {
                break;
            }
            let (line_start, line_end) = self.cursor.line_bounds(byte_pos);
            let indented = self.cursor.source[line_start..byte_pos.min(line_end)]
                .chars()
                .take_while(|c| *c == ' ' || *c == '\t')
                .count()
                > 0
                || self.cursor.source[line_start..].starts_with(' ')
                || self.cursor.source[line_start..].starts_with('\t');
            let raw = self.cursor.source[line_start..line_end].trim();
            if raw.is_empty() || !indented {
                break;
            }
            self.parse_vars_entry(raw, line_end, byte_pos);
            self.cursor.resync_to_byte(line_end + 1);
            self.cursor.skip_trivia();
        }
    }

    fn parse_vars_entry(&mut self, raw: &str, line_end: usize, byte_pos: usize) {
        let Some((name, value)) = raw.split_once(':') else {
            self.push_error(codes::MALFORMED_DECLARATION, format!("malformed @vars entry `{raw}`"), byte_pos);
            return;
        };
        let name = name.trim();
        let mut value = value.trim().to_string();
        if value.is_empty() {
            // Split `name:` / `<NL> value` form, normalized to the first
            // (spec.md §9 open question).
            let (_, next_end) = self.cursor.line_bounds(line_end + 1);
            let next_raw = self.cursor.source.get(line_end + 1..next_end).unwrap_or("").trim();
            if !next_raw.is_empty() && !next_raw.contains(':') {
                value = next_raw.to_string();
            }
        }
        let parsed = Value::parse_literal(&value);
        let var_type = VarType::of(&parsed);
        let name = self.intern(name);
        self.story
            .variables
            .insert(name.clone(), VariableDecl { name, var_type, default: parsed, list_values: None });
    }

    fn parse_list_decl(&mut self) {
        let tok = self.cursor.bump();
        let rest = self.cursor.rest_of_line(tok.position + tok.text.len());
        let Some((name, rhs)) = rest.split_once('=') else {
            self.push_error(codes::MISSING_EQUALS, "LIST declaration requires `name = ...`", tok.position);
            self.cursor.skip_to_next_line();
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            self.push_error(codes::MISSING_COLLECTION_NAME, "LIST declaration is missing a name", tok.position);
        }
        let entries: Vec<ListValueEntry> = rhs
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|entry| {
                if let Some(inner) = entry.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
                    ListValueEntry { name: self.intern(inner.trim()), active: true }
                } else {
                    ListValueEntry { name: self.intern(entry), active: false }
                }
            })
            .collect();
        let name = self.intern(name);
        self.story.lists.insert(name.clone(), ListCollection { name: name.clone(), entries: entries.clone() });
        self.story.variables.insert(
            name.clone(),
            VariableDecl {
                name,
                var_type: VarType::List,
                default: Value::List(entries.clone()),
                list_values: Some(entries),
            },
        );
        self.cursor.skip_to_next_line();
    }

    fn parse_array_decl(&mut self) {
        let tok = self.cursor.bump();
        let rest = self.cursor.rest_of_line(tok.position + tok.text.len());
        let Some((name, rhs)) = rest.split_once('=') else {
            self.push_error(codes::MISSING_EQUALS, "ARRAY declaration requires `name = [...]`", tok.position);
            self.cursor.skip_to_next_line();
            return;
        };
        let name = name.trim();
        let rhs = rhs.trim().trim_start_matches('[').trim_end_matches(']');
        let values: Vec<Value> =
            rhs.split(',').map(str::trim).filter(|s| !s.is_empty()).map(Value::parse_literal).collect();
        let name = self.intern(name);
        self.story.arrays.insert(name.clone(), ArrayCollection { name: name.clone(), values: values.clone() });
        self.story.variables.insert(
            name.clone(),
            VariableDecl { name, var_type: VarType::Array, default: Value::Array(values), list_values: None },
        );
        self.cursor.skip_to_next_line();
    }

    fn parse_map_decl(&mut self) {
        let tok = self.cursor.bump();
        let rest = self.cursor.rest_of_line(tok.position + tok.text.len());
        let Some((name, rhs)) = rest.split_once('=') else {
            self.push_error(codes::MISSING_EQUALS, "MAP declaration requires `name = { ... }`", tok.position);
            self.cursor.skip_to_next_line();
            return;
        };
        let name = name.trim();
        let rhs = rhs.trim().trim_start_matches('{').trim_end_matches('}');
        let mut entries = IndexMap::new();
        for pair in rhs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match pair.split_once(':') {
                Some((k, v)) => {
                    entries.insert(k.trim().trim_matches('"').to_string(), Value::parse_literal(v.trim()));
                }
                None => {
                    self.push_error(
                        codes::MALFORMED_DECLARATION,
                        format!("malformed MAP entry `{pair}`"),
                        tok.position,
                    );
                }
            }
        }
        let name = self.intern(name);
        self.story.maps.insert(name.clone(), MapCollection { name: name.clone(), entries: entries.clone() });
        self.story.variables.insert(
            name.clone(),
            VariableDecl { name, var_type: VarType::Map, default: Value::Map(entries), list_values: None },
        );
        self.cursor.skip_to_next_line();
    }

    fn parse_include_decl(&mut self) {
        let tok = self.cursor.bump();
        let rest = self.cursor.rest_of_line(tok.position + tok.text.len());
        match extract_quoted(rest) {
            Some(path) => self.story.includes.push(Include { path, resolved: false }),
            None => self.push_error(codes::MALFORMED_DECLARATION, "INCLUDE requires a quoted path", tok.position),
        }
        self.cursor.skip_to_next_line();
    }

    fn parse_function_decl(&mut self) {
        let tok = self.cursor.bump();
        let sig_end = self.cursor.line_bounds(tok.position).1;
        let sig = self.cursor.rest_of_line(tok.position + tok.text.len());
        let (name, params) = parse_function_signature(sig);
        let body_start = (sig_end + 1).min(self.cursor.source_end());

        let body_end = self.find_end_line(body_start).unwrap_or_else(|| {
            self.push_error(codes::FUNCTION_MISSING_END, format!("FUNCTION `{name}` is missing an END"), tok.position);
            self.cursor.source_end()
        });
        let body = self.cursor.raw_slice(body_start, body_end.min(self.cursor.source_end())).trim().to_string();

        let qualified = match self.namespace_prefix_dot() {
            Some(ns) => format!("{ns}.{name}"),
            None => name.clone(),
        };
        let namespace_owned = self.namespace_stack.last().cloned();
        let namespace = namespace_owned.map(|s| self.intern_ref(&s));
        let name_interned = self.intern(&name);
        self.story.functions.insert(
            name_interned.clone(),
            Function {
                name: name_interned,
                qualified_name: self.intern(&qualified),
                params,
                body,
                namespace,
            },
        );

        let resync_to = body_end.saturating_add(4); // past "END" if found
        self.cursor.resync_to_byte(resync_to.min(self.cursor.source_end()));
        self.cursor.skip_to_next_line();
    }

    fn intern_ref(&mut self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// Find the byte offset of a line whose trimmed content is exactly
    /// `"END"`, searching forward from `from`. Returns the start of that
    /// line (the body ends just before it).
    fn find_end_line(&self, from: usize) -> Option<usize> {
        let mut pos = from;
        while pos < self.cursor.source_end() {
            let (start, end) = self.cursor.line_bounds(pos);
            if self.cursor.source[start..end].trim() == "END" {
                return Some(start);
            }
            pos = end + 1;
        }
        None
    }

    fn parse_namespace_open(&mut self) {
        let tok = self.cursor.bump();
        let name = self.cursor.rest_of_line(tok.position + tok.text.len()).to_string();
        let qualified = match self.namespace_prefix_dot() {
            Some(parent) => format!("{parent}.{name}"),
            None => name.clone(),
        };
        if let Some(parent) = self.namespace_stack.last().cloned() {
            let parent_name = self.intern(&parent);
            let qualified_interned = self.intern(&qualified);
            if let Some(ns) = self.story.namespaces.get_mut(&parent_name) {
                ns.nested.push(qualified_interned);
            }
        }
        let key = self.intern(&qualified);
        self.story.namespaces.insert(
            key.clone(),
            Namespace { name: self.intern(&name), qualified_name: key, nested: Vec::new(), passages: Vec::new(), functions: Vec::new() },
        );
        self.namespace_stack.push(name);
        self.cursor.skip_to_next_line();
    }

    fn parse_end_keyword(&mut self) {
        let tok = self.cursor.bump();
        let rest = self.cursor.rest_of_line(tok.position + tok.text.len());
        if rest == "NAMESPACE" {
            if self.namespace_stack.pop().is_none() {
                self.push_error(codes::UNMATCHED_END_NAMESPACE, "unmatched END NAMESPACE", tok.position);
            }
        }
        self.cursor.skip_to_next_line();
    }

    fn parse_theme_decl(&mut self) {
        let tok = self.cursor.bump();
        let rest = self.cursor.rest_of_line(tok.position + tok.text.len());
        match extract_quoted(rest) {
            Some(name) => self.story.presentation.theme = Some(name),
            None => self.push_error(codes::MALFORMED_THEME_DIRECTIVE, "THEME requires a quoted name", tok.position),
        }
        self.cursor.skip_to_next_line();
    }

    fn parse_style_decl(&mut self) {
        let tok = self.cursor.bump();
        let after_kw = tok.position + tok.text.len();
        let Some(open) = self.cursor.source[after_kw..].find('{').map(|i| after_kw + i) else {
            self.push_error(codes::MALFORMED_STYLE_BLOCK, "STYLE requires a `{ ... }` block", tok.position);
            self.cursor.skip_to_next_line();
            return;
        };
        let mut depth = 0usize;
        let mut close = None;
        for (i, c) in self.cursor.source[open..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + i);
                        break;
                    }
                }
                _ => {}
            }
        }
        match close {
            Some(close_pos) => {
                let inner = self.cursor.raw_slice(open + 1, close_pos).trim().to_string();
                self.story.presentation.styles.push(inner);
                self.cursor.resync_to_byte(close_pos + 1);
            }
            None => self.push_error(codes::MALFORMED_STYLE_BLOCK, "unterminated STYLE block", tok.position),
        }
        self.cursor.skip_to_next_line();
    }

    // ---- Passages -----------------------------------------------------

    fn parse_passages(&mut self) {
        loop {
            self.cursor.skip_trivia();
            if self.cursor.is_eof() {
                break;
            }
            if self.cursor.peek_kind() != TokenKind::PassageMarker {
                self.cursor.skip_to_next_line();
                continue;
            }
            self.parse_one_passage();
        }
    }

    fn parse_one_passage(&mut self) {
        let marker = self.cursor.bump();
        let name_line_end = self.cursor.line_bounds(marker.position).1;
        let mut raw_name = self.cursor.rest_of_line(marker.position + marker.text.len()).to_string();
        let is_global = raw_name.starts_with("::");
        if is_global {
            raw_name = raw_name.trim_start_matches("::").trim().to_string();
        }
        if raw_name.is_empty() {
            self.push_error(codes::MISSING_PASSAGE_NAME, "`::` passage marker is missing a name", marker.position);
            raw_name = format!("unnamed_{}", self.passage_counter);
        }

        let qualified_name = if is_global || self.namespace_stack.is_empty() {
            raw_name.clone()
        } else {
            format!("{}::{}", self.namespace_stack.join("::"), raw_name)
        };

        if self.story.passage_by_name(&qualified_name).is_some() {
            self.push_warning(
                codes::DUPLICATE_PASSAGE,
                format!("duplicate passage `{qualified_name}`"),
                marker.position,
            );
        }

        let id: Name = Arc::from(format!("passage_{}_{}", self.passage_counter, qualified_name).as_str());
        self.passage_counter += 1;

        let marker_pos_point = self.position_of(marker.position);
        let mut passage = Passage::new(id.clone(), qualified_name.clone(), raw_name, Span::point(marker_pos_point));
        passage.namespace = self.namespace_prefix_colon().map(|s| self.intern(&s));

        self.cursor.resync_to_byte(name_line_end + 1);
        self.cursor.skip_trivia();

        // Passage-level directives immediately following the name line.
        while self.cursor.peek_kind() == TokenKind::Directive {
            let tok = self.cursor.bump();
            self.apply_passage_directive(&mut passage, &tok.text);
            self.cursor.skip_trivia();
        }

        let body_start = self.cursor.byte_pos().min(self.cursor.source_end());
        let body_end = self.scan_passage_body(&mut passage, body_start);
        passage.content = self.cursor.raw_slice(body_start, body_end).trim_end_matches('\n').to_string();

        let end_pos = self.position_of(body_end.min(self.cursor.source_end().max(1)).saturating_sub(1).max(body_start));
        passage.location = Span::new(marker_pos_point, end_pos);

        if let Some(ns) = passage.namespace.clone() {
            if let Some(entry) = self.story.namespaces.get_mut(&ns) {
                entry.passages.push(id.clone());
            }
        }

        let _ = self.story.add_passage(passage);
    }

    fn apply_passage_directive(&mut self, passage: &mut Passage, text: &str) {
        let (name, value) = match text.split_once(':') {
            Some((n, v)) => (n.trim(), v.trim().to_string()),
            None => (text.trim(), String::new()),
        };
        match name {
            "tags" => passage.tags = value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            "color" => passage.metadata.color = Some(value),
            "notes" => passage.metadata.notes = Some(value),
            "fallback" => passage.metadata.fallback = Some(value),
            "onEnter" => passage.metadata.on_enter = Some(value),
            "onExit" => passage.metadata.on_exit = Some(value),
            "position" => {
                if let Some((x, y)) = value.split_once(',') {
                    if let (Ok(x), Ok(y)) = (x.trim().parse::<f64>(), y.trim().parse::<f64>()) {
                        passage.metadata.position = Some((x, y));
                    }
                }
            }
            other => {
                passage.metadata.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Scan passage-body tokens (choice/gather/arrow/tunnel constructs)
    /// until the next `::` or EOF. Returns the body's end byte offset.
    fn scan_passage_body(&mut self, passage: &mut Passage, body_start: usize) -> usize {
        loop {
            if self.cursor.is_eof() {
                return self.cursor.source_end();
            }
            if self.cursor.peek_kind() == TokenKind::PassageMarker && self.cursor.byte_pos() >= body_start {
                return self.cursor.byte_pos();
            }
            match self.cursor.peek_kind() {
                TokenKind::ChoiceOnce | TokenKind::ChoiceSticky => {
                    let choice = self.parse_choice();
                    passage.choices.push(choice);
                }
                TokenKind::Gather => {
                    let gather = self.parse_gather();
                    passage.gathers.push(gather);
                }
                TokenKind::Arrow => {
                    self.parse_bare_arrow(passage);
                }
                TokenKind::TunnelReturn => {
                    passage.has_tunnel_return = true;
                    self.cursor.bump();
                }
                _ => {
                    self.cursor.bump();
                }
            }
        }
    }

    /// `+`/`*` choice: optional `{if…|do…}`, `[text]`, optional `{…}`,
    /// `->`, target, optional trailing `{…}` (spec.md §4.2).
    fn parse_choice(&mut self) -> Choice {
        let marker = self.cursor.bump();
        let kind = if marker.kind == TokenKind::ChoiceOnce { ChoiceKind::Once } else { ChoiceKind::Sticky };
        let depth = marker.text.chars().filter(|c| *c == '+' || *c == '*').count().max(1);
        let start_pos = marker.position;
        let mut cursor_pos = marker.position + marker.text.len();

        let mut condition = None;
        let mut action = None;

        cursor_pos = self.skip_ws(cursor_pos);
        if self.byte_at(cursor_pos) == Some('{') {
            let (block, next) = self.read_brace_block(cursor_pos);
            classify_block(block, &mut condition, &mut action);
            cursor_pos = next;
        }

        cursor_pos = self.skip_ws(cursor_pos);
        let (text, next) = self.read_bracket_text(cursor_pos);
        cursor_pos = next;

        cursor_pos = self.skip_ws(cursor_pos);
        if self.byte_at(cursor_pos) == Some('{') {
            let (block, next) = self.read_brace_block(cursor_pos);
            classify_block(block, &mut condition, &mut action);
            cursor_pos = next;
        }

        cursor_pos = self.skip_ws(cursor_pos);
        let mut target = String::new();
        if self.cursor.source[cursor_pos.min(self.cursor.source_end())..].starts_with("->") {
            cursor_pos += 2;
            let (start, line_end) = self.cursor.line_bounds(cursor_pos);
            let _ = start;
            let raw_rest = &self.cursor.source[cursor_pos..line_end];
            let target_end = raw_rest.find('{').map(|i| cursor_pos + i).unwrap_or(line_end);
            target = self.cursor.source[cursor_pos..target_end].trim().to_string();
            cursor_pos = target_end;
        } else {
            self.push_warning(codes::MISSING_CHOICE_TARGET, "choice is missing a `-> Target`", start_pos);
        }

        cursor_pos = self.skip_ws(cursor_pos);
        if self.byte_at(cursor_pos) == Some('{') {
            let (block, next) = self.read_brace_block(cursor_pos);
            classify_block(block, &mut condition, &mut action);
            cursor_pos = next;
        }

        let (_, line_end) = self.cursor.line_bounds(cursor_pos);
        let end_pos_point = self.position_of(line_end.max(cursor_pos));
        let start_pos_point = self.position_of(start_pos);
        self.cursor.resync_to_byte(line_end + 1);

        Choice { text, target, condition, action, kind, depth, location: Span::new(start_pos_point, end_pos_point) }
    }

    fn byte_at(&self, pos: usize) -> Option<char> {
        self.cursor.source[pos.min(self.cursor.source_end())..].chars().next()
    }

    fn skip_ws(&self, mut pos: usize) -> usize {
        while matches!(self.byte_at(pos), Some(' ') | Some('\t')) {
            pos += 1;
        }
        pos
    }

    /// Read a `{…}` block, balancing nested braces, returning its inner
    /// text and the byte offset just past the closing brace.
    fn read_brace_block(&self, start: usize) -> (String, usize) {
        debug_assert_eq!(self.byte_at(start), Some('{'));
        let mut depth = 0usize;
        let mut end = start;
        for (i, c) in self.cursor.source[start..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i;
                        break;
                    }
                }
                '\n' if depth <= 1 => {
                    end = start + i;
                    break;
                }
                _ => {}
            }
        }
        let inner_end = end.max(start + 1);
        let inner = self.cursor.source[start + 1..inner_end].to_string();
        (inner, (end + 1).min(self.cursor.source_end()))
    }

    /// Read `[text]` with `\[`/`\]` escapes and bracket-depth counting.
    fn read_bracket_text(&self, start: usize) -> (String, usize) {
        if self.byte_at(start) != Some('[') {
            return (String::new(), start);
        }
        let mut depth = 0usize;
        let mut out = String::new();
        let mut chars = self.cursor.source[start..].char_indices().peekable();
        let mut end = start;
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some(&(_, next_c)) = chars.peek() {
                        if next_c == '[' || next_c == ']' {
                            out.push(next_c);
                            chars.next();
                            continue;
                        }
                    }
                    out.push('\\');
                }
                '[' => {
                    depth += 1;
                    if depth > 1 {
                        out.push('[');
                    }
                }
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i + 1;
                        break;
                    }
                    out.push(']');
                }
                '\n' => break,
                _ => out.push(c),
            }
        }
        (out, end.max(start + 1))
    }

    fn parse_gather(&mut self) -> Gather {
        let tok = self.cursor.bump();
        let depth = tok.text.chars().filter(|c| *c == '-').count().max(1);
        let start_pos = self.position_of(tok.position);
        let content_start = self.cursor.byte_pos();
        let (_, line_end) = self.cursor.line_bounds(content_start.max(tok.position));
        let content = self.cursor.source[content_start.min(line_end)..line_end].trim().to_string();
        let end_pos = self.position_of(line_end);
        self.cursor.resync_to_byte(line_end + 1);
        Gather { depth, content, location: Span::new(start_pos, end_pos) }
    }

    /// `-> Target` outside choice context; `-> Target ->` is a tunnel call.
    fn parse_bare_arrow(&mut self, passage: &mut Passage) {
        let tok = self.cursor.bump();
        let (_, line_end) = self.cursor.line_bounds(tok.position);
        let rest = self.cursor.source[tok.position + tok.text.len()..line_end].trim_start();
        let (target, is_tunnel) = match rest.strip_suffix("->") {
            Some(t) => (t.trim().to_string(), true),
            None => (rest.trim().to_string(), false),
        };
        let start_pos = self.position_of(tok.position);
        let end_pos = self.position_of(line_end);
        if is_tunnel {
            let position = passage.tunnel_calls.len() + 1;
            passage.tunnel_calls.push(TunnelCall { target, position });
        } else if !target.is_empty() {
            passage.diverts.push(Divert { target, location: Span::new(start_pos, end_pos) });
        }
        self.cursor.resync_to_byte(line_end + 1);
    }
}

fn classify_block(block: String, condition: &mut Option<String>, action: &mut Option<String>) {
    let trimmed = block.trim();
    if let Some(rest) = trimmed.strip_prefix("do ") {
        *action = Some(rest.trim().to_string());
    } else if let Some(rest) = trimmed.strip_prefix("if ") {
        *condition = Some(rest.trim().to_string());
    } else if !trimmed.is_empty() {
        *action = Some(trimmed.to_string());
    }
}

fn extract_quoted(s: &str) -> Option<String> {
    let start = s.find('"')?;
    let end = s[start + 1..].find('"')? + start + 1;
    Some(s[start + 1..end].to_string())
}

fn parse_function_signature(sig: &str) -> (String, Vec<String>) {
    match sig.split_once('(') {
        Some((name, rest)) => {
            let params_raw = rest.trim_end().trim_end_matches(')');
            let params = params_raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
            (name.trim().to_string(), params)
        }
        None => (sig.trim().to_string(), Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    fn parse(src: &str) -> Story {
        let result = scan(src);
        parse_structural(src, &result.tokens, &ParserConfig::default())
    }

    #[test]
    fn parses_header_directives() {
        let story = parse("@title: My Story\n@author: Jane\n:: Start\nhi\n");
        assert_eq!(story.metadata.title.as_deref(), Some("My Story"));
        assert_eq!(story.metadata.author.as_deref(), Some("Jane"));
    }

    #[test]
    fn parses_choice_with_escaped_brackets() {
        let story = parse(":: Start\n+ [He said \\[hello\\]] -> Next\n:: Next\nOk.\n");
        let start = story.passage_by_name("Start").unwrap();
        assert_eq!(start.choices.len(), 1);
        assert_eq!(start.choices[0].text, "He said [hello]");
        assert_eq!(start.choices[0].target, "Next");
    }

    #[test]
    fn duplicate_passage_keeps_first() {
        let story = parse(":: A\nfirst\n:: A\nsecond\n");
        assert_eq!(story.passage_count(), 2);
        assert_eq!(story.passage_by_name("A").unwrap().content.trim(), "first");
        assert!(story.diagnostics.len() >= 1);
    }

    #[test]
    fn tunnel_call_and_return() {
        let story = parse(":: Main\n-> Sub ->\nafter\n:: Sub\ndetour\n<-\n");
        let main = story.passage_by_name("Main").unwrap();
        assert_eq!(main.tunnel_calls.len(), 1);
        assert_eq!(main.tunnel_calls[0].target, "Sub");
        let sub = story.passage_by_name("Sub").unwrap();
        assert!(sub.has_tunnel_return);
    }

    #[test]
    fn namespace_qualifies_passage_names() {
        let story = parse("NAMESPACE Outer\n:: Inner\nhi\nEND NAMESPACE\n:: Top\nbye\n");
        assert!(story.passage_by_name("Outer::Inner").is_some());
        assert!(story.passage_by_name("Top").is_some());
    }

    #[test]
    fn list_declaration_tracks_active_entries() {
        let story = parse("LIST colors = red, (green), blue\n:: A\nhi\n");
        let list = story.lists.values().next().unwrap();
        assert_eq!(list.entries.len(), 3);
        assert!(list.entries[1].active);
        assert!(!list.entries[0].active);
    }

    #[test]
    fn gather_depth_counts_dashes() {
        let story = parse(":: A\n+ [x] -> B\n- - reconverge\n:: B\nhi\n");
        let a = story.passage_by_name("A").unwrap();
        assert_eq!(a.gathers[0].depth, 2);
    }
}
