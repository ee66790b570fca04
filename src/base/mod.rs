//! Foundation types for the Whisker toolchain.
//!
//! This module provides the primitives used throughout the parser and
//! story model:
//! - [`Position`], [`Span`] — 1-based line/column locations for diagnostics
//!   and AST nodes.
//! - [`LineIndex`], [`LineCol`] — byte-offset ⇄ line/column conversion,
//!   used by the incremental parser's per-document cache.
//! - [`Name`], [`Interner`] — cheap-to-clone interned identifiers.
//! - [`constants`] — reserved names and settings defaults.
//!
//! This module has no dependencies on any other `whisker` module.

pub mod constants;
mod intern;
mod position;
mod span;

pub use intern::{Interner, Name};
pub use position::{Position, Span};
pub use span::{LineCol, LineIndex};

// Re-export text-size types for byte-offset spans (used internally by the
// incremental cache and the scanner; distinct from the 1-based Position
// above, which is what diagnostics and AST nodes carry).
pub use text_size::{TextRange, TextSize};
