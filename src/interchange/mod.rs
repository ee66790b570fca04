//! C8: interchange with the Ink JSON story format (spec.md §4.8).
//!
//! This component is parallel to C1–C5 rather than downstream of them: it
//! reads and writes a different AST (Ink's container-array JSON) and
//! builds/consumes a [`crate::story::Story`] through the same public
//! constructors the structural parser uses. It performs no file I/O itself
//! (spec.md §1 Non-goals) — `import` takes an already-parsed
//! [`serde_json::Value`]; `import_str` is a thin convenience wrapper for
//! hosts that would rather hand over raw bytes.

mod ink;
mod roundtrip;

pub use ink::{
    export, export_string, import, import_str, HAS_CHOICE_ONLY_CONTENT, HAS_CONDITION, HAS_START_CONTENT,
    INVISIBLE_DEFAULT, ONCE_ONLY,
};
pub use roundtrip::{compare, Difference};

/// Errors from the Ink import/export boundary. Distinct from
/// [`crate::diagnostics::Diagnostic`]: a malformed Ink document is a host
/// contract violation (the host handed us something that isn't a story),
/// not a WLS source-level defect.
#[derive(Debug, thiserror::Error)]
pub enum InterchangeError {
    #[error("Ink document missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Ink document declares unsupported inkVersion {0} (minimum 19 required)")]
    UnsupportedVersion(u64),

    #[error("Ink document `root` is not an array of container elements")]
    MalformedRoot,

    #[error("failed to parse Ink JSON: {0}")]
    Json(#[from] serde_json::Error),
}
