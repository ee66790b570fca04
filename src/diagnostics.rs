//! Diagnostics collected during scanning, parsing, module resolution, and
//! semantic validation.
//!
//! Per spec.md §7, the parser never throws a source-level defect out to the
//! caller — every lexical, syntactic, semantic, and structural problem is
//! collected here instead, and `success = (#errors == 0)`.

use crate::base::Span;
use std::cmp::Ordering;

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single diagnostic: a stable code, a human message, a location, and an
/// optional fix suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub location: Span,
    pub suggestion: Option<String>,
    pub related: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &'static str, message: impl Into<String>, location: Span) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location,
            suggestion: None,
            related: None,
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>, location: Span) -> Self {
        Self::new(Severity::Error, code, message, location)
    }

    pub fn warning(code: &'static str, message: impl Into<String>, location: Span) -> Self {
        Self::new(Severity::Warning, code, message, location)
    }

    pub fn info(code: &'static str, message: impl Into<String>, location: Span) -> Self {
        Self::new(Severity::Info, code, message, location)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_related(mut self, related: impl Into<String>) -> Self {
        self.related = Some(related.into());
        self
    }

    /// Ordering key for P4 (diagnostic order): ascending by line then column.
    fn order_key(&self) -> (usize, usize) {
        (self.location.start.line, self.location.start.column)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {}",
            self.location.start.line, self.location.start.column, self.code, self.message
        )
    }
}

/// Stable diagnostic codes (spec.md §6). Grouped by the taxonomy spec.md
/// §7 describes; a handful of exact codes are named in spec.md and must
/// not be renumbered (`WLS-REF-001`, `WLS-STR-001`, `WLS-META-001`,
/// `WLS-LNK-005`, `WLS-MOD-008`).
pub mod codes {
    // Lexical / syntactic (WLS-SYN-0NN)
    pub const UNEXPECTED_CHARACTER: &str = "WLS-SYN-001";
    pub const UNTERMINATED_STRING: &str = "WLS-SYN-002";
    pub const UNTERMINATED_BLOCK_COMMENT: &str = "WLS-SYN-003";
    pub const MISSING_PASSAGE_NAME: &str = "WLS-SYN-010";
    pub const MISSING_EQUALS: &str = "WLS-SYN-011";
    pub const MISSING_CLOSING_BRACE: &str = "WLS-SYN-012";
    pub const MISSING_COLLECTION_NAME: &str = "WLS-SYN-013";
    pub const MALFORMED_DECLARATION: &str = "WLS-SYN-014";
    pub const NESTING_GUARD_EXCEEDED: &str = "WLS-SYN-015";

    // Reference (WLS-REF-0NN)
    pub const UNDEFINED_PASSAGE_REFERENCE: &str = "WLS-REF-001";

    // Structure (WLS-STR-0NN)
    pub const DUPLICATE_PASSAGE: &str = "WLS-STR-001";

    // Module (WLS-MOD-0NN)
    pub const INCLUDE_CYCLE: &str = "WLS-MOD-001";
    pub const INCLUDE_DEPTH_EXCEEDED: &str = "WLS-MOD-002";
    pub const INCLUDE_UNRESOLVED: &str = "WLS-MOD-003";
    pub const FUNCTION_MISSING_END: &str = "WLS-MOD-006";
    pub const NAMESPACE_MISSING_END: &str = "WLS-MOD-007";
    pub const UNMATCHED_END_NAMESPACE: &str = "WLS-MOD-008";

    // Metadata (WLS-META-0NN)
    pub const INVALID_IFID: &str = "WLS-META-001";
    pub const UNKNOWN_SETTING_KEY: &str = "WLS-META-002";
    pub const INVALID_SETTING_VALUE: &str = "WLS-META-003";
    pub const VARIABLE_TYPE_MISMATCH: &str = "WLS-META-004";
    pub const INVALID_VARIABLE_TYPE: &str = "WLS-META-005";
    pub const UNKNOWN_HEADER_DIRECTIVE: &str = "WLS-META-006";

    // Presentation (WLS-PRS-0NN)
    pub const MALFORMED_STYLE_BLOCK: &str = "WLS-PRS-001";
    pub const MALFORMED_THEME_DIRECTIVE: &str = "WLS-PRS-002";
    pub const UNKNOWN_HOOK_OPERATION: &str = "WLS-PRS-003";

    // Links (WLS-LNK-0NN)
    pub const MISSING_CHOICE_TARGET: &str = "WLS-LNK-005";

    // Interchange-only (orphan detection is comparator/validator output,
    // not a parser diagnostic per spec.md §7, but reuses the same type).
    pub const ORPHAN_PASSAGE: &str = "WLS-REF-002";
}

/// Accumulates diagnostics during a parse and produces them in the stable,
/// source order required by P4.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Consume the collector, returning diagnostics sorted by (line, column)
    /// — a stable sort, so diagnostics emitted at the same position keep
    /// their relative emission order.
    pub fn into_sorted_vec(mut self) -> Vec<Diagnostic> {
        self.diagnostics.sort_by(|a, b| cmp_order(a, b));
        self.diagnostics
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(other);
    }
}

fn cmp_order(a: &Diagnostic, b: &Diagnostic) -> Ordering {
    a.order_key().cmp(&b.order_key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Position;

    fn diag_at(line: usize, col: usize) -> Diagnostic {
        Diagnostic::error(codes::UNDEFINED_PASSAGE_REFERENCE, "x", Span::point(Position::new(line, col)))
    }

    #[test]
    fn sorts_by_line_then_column() {
        let mut c = DiagnosticCollector::new();
        c.push(diag_at(3, 1));
        c.push(diag_at(1, 5));
        c.push(diag_at(1, 2));
        let sorted = c.into_sorted_vec();
        let keys: Vec<_> = sorted.iter().map(|d| (d.location.start.line, d.location.start.column)).collect();
        assert_eq!(keys, vec![(1, 2), (1, 5), (3, 1)]);
    }
}
