//! Hand-written, byte-dispatch scanner (spec.md §4.1, design notes §9).
//!
//! WLS tokenization is context sensitive — whether `+`/`*`/`-` start a
//! choice/gather marker depends on the *previous emitted token* — which a
//! declarative longest-match lexer can't express without a second pass.
//! So instead of a generated table, this is a single state machine keyed on
//! the current byte, dispatching to small per-construct scan functions.

use super::token::{Token, TokenKind};
use crate::base::{Position, Span};
use crate::diagnostics::{codes, Diagnostic, DiagnosticCollector};

pub struct ScanResult {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
    pub success: bool,
}

/// Tokenize `source` into the closed token set described in spec.md §4.1.
pub fn scan(source: &str) -> ScanResult {
    let mut scanner = Scanner::new(source);
    scanner.run();
    let success = !scanner.diagnostics.has_errors();
    ScanResult {
        tokens: scanner.tokens,
        diagnostics: scanner.diagnostics.into_sorted_vec(),
        success,
    }
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    at_line_start: bool,
    prev_kind: Option<TokenKind>,
    tokens: Vec<Token>,
    diagnostics: DiagnosticCollector,
    text_start: Option<(usize, usize, usize)>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
            at_line_start: true,
            prev_kind: None,
            tokens: Vec::new(),
            diagnostics: DiagnosticCollector::new(),
            text_start: None,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Consume one character, advancing line/column/byte position.
    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn emit(&mut self, kind: TokenKind, text: &str, line: usize, column: usize, position: usize) {
        self.tokens.push(Token::new(kind, text, line, column, position));
        self.prev_kind = Some(kind);
    }

    /// Flush any pending TEXT run accumulated by the fallback path.
    fn flush_text(&mut self) {
        if let Some((start_pos, start_line, start_col)) = self.text_start.take() {
            if start_pos < self.pos {
                let text = &self.src[start_pos..self.pos];
                self.emit(TokenKind::Text, text, start_line, start_col, start_pos);
            }
        }
    }

    fn run(&mut self) {
        loop {
            let Some(c) = self.peek() else {
                self.flush_text();
                break;
            };

            if self.try_scan_special(c) {
                continue;
            }

            // Fallback: accumulate into the current TEXT run.
            if self.text_start.is_none() {
                self.text_start = Some((self.pos, self.line, self.column));
            }
            self.bump();
        }
        self.tokens.push(Token::new(TokenKind::Eof, "", self.line, self.column, self.pos));
    }

    /// Try to recognize a structural/flow/literal token at the current
    /// position. Returns `true` if something was consumed (a token was
    /// emitted, or trivia was silently skipped).
    fn try_scan_special(&mut self, c: char) -> bool {
        match c {
            '\r' | '\n' => {
                self.flush_text();
                self.scan_newline();
                true
            }
            ' ' | '\t' if self.at_line_start && self.text_start.is_none() => {
                self.scan_indent();
                true
            }
            ' ' | '\t' if self.text_start.is_none() => {
                // Inline whitespace between tokens: silently skipped, like
                // comments — not part of any emitted token (spec.md P1
                // treats this as trivia alongside NEWLINE/INDENT/comments).
                self.bump();
                true
            }
            '/' if self.peek_at(1) == Some('/') => {
                self.flush_text();
                self.scan_line_comment();
                true
            }
            '/' if self.peek_at(1) == Some('*') => {
                self.flush_text();
                self.scan_block_comment();
                true
            }
            ':' if self.peek_at(1) == Some(':') && self.at_line_start && self.text_start.is_none() => {
                self.flush_text();
                self.scan_fixed(TokenKind::PassageMarker, "::");
                true
            }
            '@' if self.at_line_start && self.text_start.is_none() => {
                self.flush_text();
                self.scan_directive()
            }
            '+' if self.text_start.is_none() && self.choice_context_ok() => {
                self.flush_text();
                self.scan_choice_marker(TokenKind::ChoiceOnce, '+');
                true
            }
            '*' if self.text_start.is_none() && self.choice_context_ok() => {
                self.flush_text();
                self.scan_choice_marker(TokenKind::ChoiceSticky, '*');
                true
            }
            '-' if self.peek_at(1) == Some('>') => {
                self.flush_text();
                self.scan_fixed(TokenKind::Arrow, "->");
                true
            }
            '-' if self.text_start.is_none() && self.choice_context_ok() => {
                self.flush_text();
                self.scan_gather();
                true
            }
            '<' if self.peek_at(1) == Some('-') => {
                self.flush_text();
                self.scan_fixed(TokenKind::TunnelReturn, "<-");
                true
            }
            '{' if self.rest().starts_with("{/}") => {
                self.flush_text();
                self.scan_fixed(TokenKind::BlockClose, "{/}");
                true
            }
            '{' if self.rest().starts_with("{else}") => {
                self.flush_text();
                let start = (self.line, self.column, self.pos);
                for _ in 0.."{else}".len() {
                    self.bump();
                }
                self.emit(TokenKind::Else, "else", start.0, start.1, start.2);
                true
            }
            '{' if self.is_elif_start() => {
                self.flush_text();
                self.scan_elif();
                true
            }
            '{' => {
                self.flush_text();
                self.scan_fixed(TokenKind::BlockStart, "{");
                true
            }
            '}' => {
                self.flush_text();
                self.scan_fixed(TokenKind::BlockEnd, "}");
                true
            }
            '|' => {
                self.flush_text();
                self.scan_fixed(TokenKind::Pipe, "|");
                true
            }
            '$' => {
                self.flush_text();
                self.scan_interpolation();
                true
            }
            '"' if self.text_start.is_none() => {
                self.flush_text();
                self.scan_string();
                true
            }
            c if c.is_ascii_digit() && self.text_start.is_none() => {
                self.flush_text();
                self.scan_number();
                true
            }
            c if (c.is_alphabetic() || c == '_') && self.text_start.is_none() => self.try_scan_word(),
            _ => false,
        }
    }

    fn choice_context_ok(&self) -> bool {
        match self.prev_kind {
            None => true,
            Some(k) => k.starts_choice_context(),
        }
    }

    fn scan_fixed(&mut self, kind: TokenKind, text: &'static str) {
        let (line, col, pos) = (self.line, self.column, self.pos);
        for _ in 0..text.chars().count() {
            self.bump();
        }
        self.emit(kind, text, line, col, pos);
        if kind != TokenKind::Newline {
            self.at_line_start = false;
        }
    }

    fn scan_newline(&mut self) {
        let (line, col, pos) = (self.line, self.column, self.pos);
        let mut text = String::new();
        if self.peek() == Some('\r') {
            text.push(self.bump().unwrap());
        }
        if self.peek() == Some('\n') {
            text.push(self.bump().unwrap());
        }
        self.emit(TokenKind::Newline, &text, line, col, pos);
        self.at_line_start = true;
    }

    fn scan_indent(&mut self) {
        let (line, col, pos) = (self.line, self.column, self.pos);
        let mut text = String::new();
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            text.push(self.bump().unwrap());
        }
        self.emit(TokenKind::Indent, &text, line, col, pos);
        // `at_line_start` stays true: INDENT precedes the line's first
        // significant token, it doesn't end the line start.
    }

    fn scan_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn scan_block_comment(&mut self) {
        let start = self.here();
        self.bump(); // '/'
        self.bump(); // '*'
        loop {
            match self.peek() {
                None => {
                    self.diagnostics.push(Diagnostic::error(
                        codes::UNTERMINATED_BLOCK_COMMENT,
                        "unterminated block comment",
                        Span::point(start),
                    ));
                    return;
                }
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    return;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// `@name: value` header directive, or the bare `@vars` block opener.
    fn scan_directive(&mut self) -> bool {
        let start = (self.line, self.column, self.pos);
        let save = (self.pos, self.line, self.column);
        self.bump(); // '@'

        let name_start = self.pos;
        if !matches!(self.peek(), Some(c) if c.is_alphabetic() || c == '_') {
            self.restore(save);
            self.diagnostics.push(Diagnostic::error(
                codes::UNEXPECTED_CHARACTER,
                "unexpected '@'",
                Span::point(self.here()),
            ));
            self.bump();
            return true;
        }
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let name = &self.src[name_start..self.pos];

        if name == "vars" {
            // Accept both `@vars` and `@vars:` (trailing colon optional).
            if self.peek() == Some(':') {
                self.bump();
            }
            self.emit(TokenKind::VarsStart, "vars", start.0, start.1, start.2);
            self.at_line_start = false;
            return true;
        }

        if self.peek() != Some(':') {
            self.restore(save);
            self.diagnostics.push(Diagnostic::error(
                codes::UNEXPECTED_CHARACTER,
                format!("malformed directive '@{}'", name),
                Span::point(self.here()),
            ));
            self.bump();
            return true;
        }
        self.bump(); // ':'
        let value_start = self.pos;
        while matches!(self.peek(), Some(c) if c != '\n' && c != '\r') {
            self.bump();
        }
        let value = self.src[value_start..self.pos].trim();
        let full = format!("{}: {}", name, value);
        self.emit(TokenKind::Directive, &full, start.0, start.1, start.2);
        self.at_line_start = false;
        true
    }

    fn restore(&mut self, (pos, line, column): (usize, usize, usize)) {
        self.pos = pos;
        self.line = line;
        self.column = column;
    }

    /// Consecutive `-` (optionally separated by single spaces) form one
    /// GATHER token whose depth is the count of dash characters — the
    /// scanner performs the "count consecutive `-`" work spec.md §4.2
    /// assigns to the structural parser, since only the scanner tracks
    /// byte-exact adjacency.
    fn scan_gather(&mut self) {
        let (line, col, pos) = (self.line, self.column, self.pos);
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('-') => text.push(self.bump().unwrap()),
                Some(' ') if self.peek_at(1) == Some('-') => {
                    text.push(self.bump().unwrap());
                }
                _ => break,
            }
        }
        self.emit(TokenKind::Gather, &text, line, col, pos);
        self.at_line_start = false;
    }

    /// A contiguous run of the same choice-marker character (optionally
    /// separated by single spaces) is one token; its length gives the
    /// nesting depth, mirroring `scan_gather`'s dash counting (spec.md §3
    /// "depth (nesting level from count of marker characters)").
    fn scan_choice_marker(&mut self, kind: TokenKind, marker: char) {
        let (line, col, pos) = (self.line, self.column, self.pos);
        let mut text = String::new();
        loop {
            match self.peek() {
                Some(c) if c == marker => text.push(self.bump().unwrap()),
                Some(' ') if self.peek_at(1) == Some(marker) => {
                    text.push(self.bump().unwrap());
                }
                _ => break,
            }
        }
        self.emit(kind, &text, line, col, pos);
        self.at_line_start = false;
    }

    fn is_elif_start(&self) -> bool {
        if !self.rest().starts_with("{elif") {
            return false;
        }
        matches!(self.peek_at(5), Some(c) if c.is_whitespace())
    }

    fn scan_elif(&mut self) {
        let start = self.here();
        let start_pos = self.pos;
        self.bump(); // '{'
        for _ in "elif".chars() {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
        let expr_start = self.pos;
        while let Some(c) = self.peek() {
            if c == '}' {
                break;
            }
            if c == '\n' {
                break;
            }
            self.bump();
        }
        let expr = self.src[expr_start..self.pos].trim().to_string();
        if self.peek() == Some('}') {
            self.bump();
        } else {
            self.diagnostics.push(Diagnostic::error(
                codes::MISSING_CLOSING_BRACE,
                "unterminated {elif ...} block",
                Span::point(start),
            ));
        }
        self.emit(TokenKind::Elif, &expr, start.line, start.column, start_pos);
        self.at_line_start = false;
    }

    fn scan_interpolation(&mut self) {
        let start = self.here();
        let start_pos = self.pos;
        self.bump(); // '$'

        if self.peek() == Some('{') {
            self.bump();
            let expr_start = self.pos;
            let mut depth = 1usize;
            while let Some(c) = self.peek() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                self.bump();
            }
            let expr = &self.src[expr_start..self.pos];
            if self.peek() == Some('}') {
                self.bump();
            } else {
                self.diagnostics.push(Diagnostic::error(
                    codes::MISSING_CLOSING_BRACE,
                    "unterminated ${...} interpolation",
                    Span::point(start),
                ));
            }
            self.emit(TokenKind::ExprInterp, expr, start.line, start.column, start_pos);
            self.at_line_start = false;
            return;
        }

        let temp = self.peek() == Some('_');
        if temp {
            self.bump();
        }
        let name_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        if self.pos == name_start {
            // Bare `$` with no following identifier: not interpolation.
            self.emit(TokenKind::Text, "$", start.line, start.column, start_pos);
            self.at_line_start = false;
            return;
        }
        let name = &self.src[name_start..self.pos];
        let kind = if temp { TokenKind::TempVarInterp } else { TokenKind::VarInterp };
        self.emit(kind, name, start.line, start.column, start_pos);
        self.at_line_start = false;
    }

    fn scan_string(&mut self) {
        let start = self.here();
        let start_pos = self.pos;
        self.bump(); // opening quote
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.diagnostics.push(Diagnostic::error(
                        codes::UNTERMINATED_STRING,
                        "unterminated string literal",
                        Span::point(start),
                    ));
                    break;
                }
                Some('\\') => {
                    self.bump();
                    self.bump(); // escaped char, consumed verbatim
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let text = &self.src[start_pos..self.pos];
        self.emit(TokenKind::String, text, start.line, start.column, start_pos);
        self.at_line_start = false;
    }

    fn scan_number(&mut self) {
        let start = self.here();
        let start_pos = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.src[start_pos..self.pos];
        self.emit(TokenKind::Number, text, start.line, start.column, start_pos);
        self.at_line_start = false;
    }

    /// At a clean token boundary: recognize `true`/`false`, or (at line
    /// start) one of the structural keywords. Any other word is left for
    /// the fallback TEXT accumulator (one character at a time).
    fn try_scan_word(&mut self) -> bool {
        let word_len = self
            .rest()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .count();
        let word: String = self.rest().chars().take(word_len).collect();
        let boundary_ok = !matches!(self.peek_at(word_len), Some(c) if c.is_alphanumeric() || c == '_');
        if !boundary_ok {
            return false;
        }

        let kind = match word.as_str() {
            "true" | "false" => Some(TokenKind::Boolean),
            "LIST" if self.at_line_start => Some(TokenKind::ListKw),
            "ARRAY" if self.at_line_start => Some(TokenKind::ArrayKw),
            "MAP" if self.at_line_start => Some(TokenKind::MapKw),
            "INCLUDE" if self.at_line_start => Some(TokenKind::IncludeKw),
            "FUNCTION" if self.at_line_start => Some(TokenKind::FunctionKw),
            "NAMESPACE" if self.at_line_start => Some(TokenKind::NamespaceKw),
            "END" if self.at_line_start => Some(TokenKind::EndKw),
            "THEME" if self.at_line_start => Some(TokenKind::ThemeKw),
            "STYLE" if self.at_line_start => Some(TokenKind::StyleKw),
            _ => None,
        };

        let Some(kind) = kind else { return false };
        let (line, col, pos) = (self.line, self.column, self.pos);
        for _ in 0..word_len {
            self.bump();
        }
        self.emit(kind, &word, line, col, pos);
        self.at_line_start = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        scan(src).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn passage_marker_and_name() {
        let k = kinds(":: Start\nhi\n");
        assert_eq!(k[0], TokenKind::PassageMarker);
    }

    #[test]
    fn choice_once_at_line_start() {
        let k = kinds(":: A\n+ [Go] -> B\n");
        assert!(k.contains(&TokenKind::ChoiceOnce));
        assert!(k.contains(&TokenKind::Arrow));
    }

    #[test]
    fn star_mid_line_is_text_not_choice() {
        let result = scan(":: A\nword *not a choice*\n");
        // The leading '*' of the second line is NOT preceded by a newline
        // in this case since it's mid-sentence ("word *not...") so it must
        // not become CHOICE_STICKY.
        assert!(!result.tokens.iter().any(|t| t.kind == TokenKind::ChoiceSticky));
    }

    #[test]
    fn gather_counts_dashes() {
        let result = scan(":: A\n+ [x] -> B\n- - reconverge\n");
        let gather = result.tokens.iter().find(|t| t.kind == TokenKind::Gather).unwrap();
        assert_eq!(gather.text.chars().filter(|c| *c == '-').count(), 2);
    }

    #[test]
    fn tunnel_call_and_return() {
        let k = kinds(":: Main\n-> Sub ->\n:: Sub\n<-\n");
        assert!(k.contains(&TokenKind::Arrow));
        assert!(k.contains(&TokenKind::TunnelReturn));
    }

    #[test]
    fn directive_captures_value() {
        let result = scan("@title: My Story\n");
        let tok = &result.tokens[0];
        assert_eq!(tok.kind, TokenKind::Directive);
        assert_eq!(tok.text.as_str(), "title: My Story");
    }

    #[test]
    fn unterminated_string_recovers_at_line_end() {
        let result = scan("THEME \"oops\n:: A\nhi\n");
        assert!(!result.success);
        assert!(result.tokens.iter().any(|t| t.kind == TokenKind::PassageMarker));
    }

    #[test]
    fn line_comment_is_not_emitted() {
        let result = scan("// a comment\n:: A\n");
        assert!(!result.tokens.iter().any(|t| t.text.contains("comment")));
    }

    #[test]
    fn var_interp_and_expr_interp() {
        let k = kinds(":: A\nHi $name, ${1 + 1}\n");
        assert!(k.contains(&TokenKind::VarInterp));
        assert!(k.contains(&TokenKind::ExprInterp));
    }
}
