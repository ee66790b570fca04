//! Reserved names and default values shared across the scanner, parser,
//! and story model.

/// Divert/choice targets that are handled by the runtime engine and are
/// therefore exempt from reference validation (WLS-REF-001).
pub const RESERVED_TARGETS: [&str; 3] = ["END", "BACK", "RESTART"];

pub fn is_reserved_target(name: &str) -> bool {
    RESERVED_TARGETS.contains(&name)
}

/// Settings defaults (spec.md §3 "Settings").
pub const DEFAULT_TUNNEL_LIMIT: u32 = 100;
pub const DEFAULT_STRICT_MODE: bool = false;
pub const DEFAULT_STRICT_HOOKS: bool = false;
pub const DEFAULT_DEBUG: bool = false;
pub const DEFAULT_END_TEXT: &str = "The End";
pub const DEFAULT_CONTINUE_TEXT: &str = "Continue";
pub const DEFAULT_MAX_INCLUDE_DEPTH: u32 = 50;

/// Default bracket/block nesting guard (spec.md §5 resource bounds).
pub const DEFAULT_NESTING_GUARD: usize = 128;

/// Recognized story-level setting keys (spec.md §3 "Settings").
pub const RECOGNIZED_SETTINGS_KEYS: [&str; 9] = [
    "tunnel_limit",
    "choice_fallback",
    "random_seed",
    "strict_mode",
    "strict_hooks",
    "debug",
    "end_text",
    "continue_text",
    "max_include_depth",
];

/// Recognized header directive names (spec.md §4.2 step 1).
pub const RECOGNIZED_HEADER_DIRECTIVES: [&str; 11] = [
    "title",
    "author",
    "version",
    "ifid",
    "start",
    "description",
    "created",
    "modified",
    "theme",
    "fallback",
    "seed",
];

/// Hook operation names (spec.md §4.3 `hook_operation`).
pub const HOOK_OPERATIONS: [&str; 5] = ["replace", "append", "prepend", "show", "hide"];
