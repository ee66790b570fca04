//! Story-level settings (spec.md §3 "Settings").

use crate::base::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceFallback {
    ImplicitEnd,
    Continue,
    Error,
    None,
}

impl ChoiceFallback {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "implicit_end" => Some(Self::ImplicitEnd),
            "continue" => Some(Self::Continue),
            "error" => Some(Self::Error),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

impl Default for ChoiceFallback {
    fn default() -> Self {
        Self::ImplicitEnd
    }
}

/// Recognized story settings, each keyed by one of
/// [`constants::RECOGNIZED_SETTINGS_KEYS`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub tunnel_limit: u32,
    pub choice_fallback: ChoiceFallback,
    pub random_seed: Option<i64>,
    pub strict_mode: bool,
    pub strict_hooks: bool,
    pub debug: bool,
    pub end_text: String,
    pub continue_text: String,
    pub max_include_depth: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tunnel_limit: constants::DEFAULT_TUNNEL_LIMIT,
            choice_fallback: ChoiceFallback::default(),
            random_seed: None,
            strict_mode: constants::DEFAULT_STRICT_MODE,
            strict_hooks: constants::DEFAULT_STRICT_HOOKS,
            debug: constants::DEFAULT_DEBUG,
            end_text: constants::DEFAULT_END_TEXT.to_string(),
            continue_text: constants::DEFAULT_CONTINUE_TEXT.to_string(),
            max_include_depth: constants::DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}
