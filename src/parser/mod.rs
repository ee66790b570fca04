//! C2 (structural parser) and C3 (content parser).
//!
//! The structural parser walks the token stream to build the [`crate::story::Story`]
//! skeleton (header metadata, passages, choices, gathers); the content
//! parser then turns each passage's raw body text into a [`crate::story::content::ContentNode`]
//! tree on demand.

mod content;
mod cursor;
mod structural;

pub use content::parse_content;
pub use structural::parse_structural;
