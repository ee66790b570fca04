//! C1: the scanner (spec.md §4.1).
//!
//! Tokenizes the entire document — header through every passage body — so
//! the Structural Parser (C2) has token-level visibility into choice,
//! gather, and tunnel markers wherever they appear. Rich-text parsing
//! (C3) works from the raw source text of a passage, not from these
//! tokens.

mod scan;
mod token;

pub use scan::{scan, ScanResult};
pub use token::{Token, TokenKind};
