//! The scanner's closed token-kind set (spec.md §4.1).

use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Structural
    PassageMarker,
    Directive,
    VarsStart,

    // Choices / flow
    ChoiceOnce,
    ChoiceSticky,
    Arrow,
    TunnelReturn,
    Gather,

    // Blocks
    BlockStart,
    BlockEnd,
    BlockClose,
    Else,
    Elif,
    Pipe,

    // Interpolation
    VarInterp,
    TempVarInterp,
    ExprInterp,

    // Literals
    Text,
    String,
    Number,
    Boolean,

    // Trivia
    Newline,
    Indent,

    // Keywords (recognized at line start)
    ListKw,
    ArrayKw,
    MapKw,
    IncludeKw,
    FunctionKw,
    NamespaceKw,
    EndKw,
    ThemeKw,
    StyleKw,

    Eof,
}

impl TokenKind {
    /// Tokens that satisfy the choice-context rule as a "previous token"
    /// (spec.md §4.1): `+`, `*`, `-` only start a choice/gather marker when
    /// the prior emitted token is one of these (or we're at stream start).
    pub fn starts_choice_context(self) -> bool {
        matches!(
            self,
            TokenKind::Newline | TokenKind::Indent | TokenKind::BlockEnd | TokenKind::BlockClose | TokenKind::Else
        )
    }
}

/// A scanned token: its kind, literal text, and source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: SmolStr,
    pub line: usize,
    pub column: usize,
    /// Byte offset of the token's first byte.
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<SmolStr>, line: usize, column: usize, position: usize) -> Self {
        Self { kind, text: text.into(), line, column, position }
    }
}
