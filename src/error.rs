//! Host-contract violations, distinct from source-level [`crate::diagnostics::Diagnostic`]s.
//!
//! Per spec.md §7, the parser never throws for a defect in the *story
//! source* — those become diagnostics and the parse still succeeds. This
//! type is for the narrower set of ways a *caller* can misuse the API:
//! an unknown document URI, a malformed edit range, and the like.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WhiskerError {
    #[error("no cached document for URI `{0}`; call parse_document first")]
    UnknownDocument(String),

    #[error("edit range start {start:?} is after end {end:?}")]
    InvalidEditRange { start: (u32, u32), end: (u32, u32) },

    #[error("edit range {0:?} is out of bounds for the cached document")]
    RangeOutOfBounds((u32, u32)),

    #[error("include graph exceeded max_include_depth ({0})")]
    IncludeDepthExceeded(u32),

    #[error(transparent)]
    Interchange(#[from] crate::interchange::InterchangeError),
}

pub type Result<T> = std::result::Result<T, WhiskerError>;
