//! C6: the Story Model (spec.md §3, §4.6).
//!
//! Typed containers enforcing the invariants spec.md lists: passage ids
//! are unique, names resolve first-occurrence-wins, and every
//! cross-reference (choice target, include, namespace nesting) is carried
//! by name/id rather than by owning reference.

pub mod content;
pub mod module;
pub mod passage;
pub mod settings;
mod story;
pub mod variable;

pub use content::ContentNode;
pub use module::{parse_qualified_name, Function, Include, Namespace, QualifiedName};
pub use passage::{Choice, ChoiceKind, Divert, Gather, Passage, PassageMetadata, TunnelCall};
pub use settings::{ChoiceFallback, Settings};
pub use story::{PresentationDirectives, RawSetting, Story, StoryBuildError, StoryMetadata};
pub use variable::{ArrayCollection, ListCollection, ListValueEntry, MapCollection, VarType, Value, VariableDecl};
