//! Personas: named starting conversations
//!
//! A persona file is `<config>/personas/<name>.toml`:
//!
//! ```toml
//! [[turn]]
//! role = "system"
//! content = "You are a terse reviewer."
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, bail};
use natter_ai::{Role, Turn};
use natter_chat::Conversation;
use serde::Deserialize;

pub const DEFAULT_PERSONA: &str = "helpful_assistant";

const HELPFUL_ASSISTANT: &str = "You are a helpful assistant.";

#[derive(Debug, Deserialize)]
struct PersonaFile {
    #[serde(rename = "turn", default)]
    turns: Vec<PersonaTurn>,
}

#[derive(Debug, Deserialize)]
struct PersonaTurn {
    role: Role,
    content: String,
}

/// Names of the personas available in `dir`, including the built-in one
pub fn available(dir: &Path) -> Vec<String> {
    let mut names = vec![DEFAULT_PERSONA.to_string()];
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "toml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !names.iter().any(|n| n == stem) {
                    names.push(stem.to_string());
                }
            }
        }
    }
    names.sort();
    names
}

/// Load persona `name`, stamping its turns with `model` and `user`.
pub fn load(dir: &Path, name: &str, model: &str, user: &str) -> anyhow::Result<Conversation> {
    let path = dir.join(format!("{}.toml", name));
    let turns = if path.is_file() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read persona {}", path.display()))?;
        let file: PersonaFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse persona {}", path.display()))?;
        file.turns
            .into_iter()
            .map(|t| Turn::new(t.role, t.content))
            .collect()
    } else if name == DEFAULT_PERSONA {
        vec![Turn::system(HELPFUL_ASSISTANT)]
    } else {
        bail!(
            "Unknown persona '{}'. Available personas: {}",
            name,
            available(dir).join(", ")
        );
    };

    tracing::debug!("Loaded persona {} ({} turns)", name, turns.len());
    Ok(Conversation::from_turns(
        turns
            .into_iter()
            .map(|t| t.with_model(model).with_user(user))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_persona() {
        let dir = tempfile::tempdir().unwrap();
        let chat = load(dir.path(), DEFAULT_PERSONA, "gpt-4", "ana").unwrap();
        assert_eq!(chat.len(), 1);
        let turn = &chat.turns()[0];
        assert_eq!(turn.role, Role::System);
        assert_eq!(turn.content, HELPFUL_ASSISTANT);
        assert_eq!(turn.user, "ana");
    }

    #[test]
    fn test_persona_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("pirate.toml"),
            "[[turn]]\nrole = \"system\"\ncontent = \"Talk like a pirate.\"\n\n\
             [[turn]]\nrole = \"user\"\ncontent = \"Ahoy\"\n",
        )
        .unwrap();

        let chat = load(dir.path(), "pirate", "gpt-4", "ana").unwrap();
        assert_eq!(chat.len(), 2);
        assert_eq!(chat.turns()[1].role, Role::User);
        assert_eq!(chat.next_role(), Role::Assistant);
        assert_eq!(available(dir.path()), vec!["helpful_assistant", "pirate"]);
    }

    #[test]
    fn test_unknown_persona_lists_available() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("coach.toml"), "").unwrap();
        let err = load(dir.path(), "nobody", "gpt-4", "ana").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("nobody"));
        assert!(message.contains("coach"));
        assert!(message.contains("helpful_assistant"));
    }

    #[test]
    fn test_malformed_persona() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.toml"), "[[turn]]\nrole = \"narrator\"\n").unwrap();
        assert!(load(dir.path(), "bad", "gpt-4", "ana").is_err());
    }
}
