//! Model registry: context-window sizes for known chat models.

use serde::{Deserialize, Serialize};

/// Context window assumed for model ids the registry does not know.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 8192;

/// (id prefix, context window in tokens)
const KNOWN_MODELS: &[(&str, u32)] = &[
    ("gpt-3.5-turbo", 4096),
    ("gpt-3.5-turbo-16k", 16384),
    ("gpt-4", 8192),
    ("gpt-4-32k", 32768),
    ("gpt-4-turbo", 128000),
    ("gpt-4o", 128000),
    ("gpt-4o-mini", 128000),
];

/// The model a conversation is generated with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Model identifier sent to the API (e.g., "gpt-4")
    pub id: String,
    /// Context window size in tokens
    pub context_window: u32,
}

impl ModelProfile {
    pub fn new(id: impl Into<String>, context_window: u32) -> Self {
        Self {
            id: id.into(),
            context_window,
        }
    }
}

/// Look up a model by ID. Dated snapshots ("gpt-4-0613") resolve to the
/// longest registered prefix.
pub fn get_model(id: &str) -> Option<ModelProfile> {
    KNOWN_MODELS
        .iter()
        .filter(|(prefix, _)| id.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, window)| ModelProfile::new(id, *window))
}

/// Resolve a model, falling back to [`DEFAULT_CONTEXT_WINDOW`]. An explicit
/// window always wins.
pub fn resolve(id: &str, context_window: Option<u32>) -> ModelProfile {
    let mut profile =
        get_model(id).unwrap_or_else(|| ModelProfile::new(id, DEFAULT_CONTEXT_WINDOW));
    if let Some(window) = context_window {
        profile.context_window = window;
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup() {
        assert_eq!(get_model("gpt-4").unwrap().context_window, 8192);
        assert_eq!(get_model("gpt-4-32k").unwrap().context_window, 32768);
    }

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(get_model("gpt-4o-2024-08-06").unwrap().context_window, 128000);
        assert_eq!(get_model("gpt-3.5-turbo-16k-0613").unwrap().context_window, 16384);
        assert_eq!(get_model("gpt-4-0613").unwrap().context_window, 8192);
    }

    #[test]
    fn test_unknown_model_falls_back() {
        assert!(get_model("llama3").is_none());
        let profile = resolve("llama3", None);
        assert_eq!(profile.id, "llama3");
        assert_eq!(profile.context_window, DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn test_override_window() {
        assert_eq!(resolve("gpt-4", Some(1000)).context_window, 1000);
    }
}
