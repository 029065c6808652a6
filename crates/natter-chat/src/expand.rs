//! Expansion of content links before a conversation is sent.
//!
//! Two link forms are recognized inside turn content:
//!
//! - `:file:PATH:` is replaced by the file's contents between delimiter lines.
//! - `:vault:NAME:` is looked up in the vault directory and then treated as a
//!   file link to the first match.
//!
//! Failures never abort a generation; they become text the model can relay.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::{Captures, Regex};

use crate::conversation::Conversation;

static FILE_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":file:([^:\n]+):").unwrap());
static VAULT_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":vault:([^:\n]+):").unwrap());

/// Resolves links against the file system
#[derive(Debug, Clone, Default)]
pub struct Expander {
    vault_dir: Option<PathBuf>,
}

impl Expander {
    pub fn new(vault_dir: Option<PathBuf>) -> Self {
        Self { vault_dir }
    }

    /// Expand all links in one piece of text.
    pub fn expand_text(&self, text: &str) -> String {
        let resolved = VAULT_LINK.replace_all(text, |caps: &Captures| self.resolve_vault_link(&caps[1]));
        FILE_LINK
            .replace_all(&resolved, |caps: &Captures| embed_file(&expand_home(&caps[1])))
            .into_owned()
    }

    /// Copy of `conversation` with every turn's content expanded.
    pub fn expand(&self, conversation: &Conversation) -> Conversation {
        conversation
            .iter()
            .map(|turn| {
                let mut turn = turn.clone();
                turn.content = self.expand_text(&turn.content);
                turn
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn resolve_vault_link(&self, name: &str) -> String {
        let Some(vault_dir) = &self.vault_dir else {
            return format!(
                "Error: No vault is configured, so \"{}\" could not be looked up. \
                 Tell this to the user very briefly, ignoring the rest of the prompt.",
                name
            );
        };
        match search_vault(vault_dir, name) {
            Some(path) => format!(":file:{}:", path.display()),
            None => format!(
                "Error: No file named \"{}\" was found in the vault at {}. \
                 Tell this to the user very briefly, ignoring the rest of the prompt.",
                name,
                vault_dir.display()
            ),
        }
    }
}

/// First file (in sorted order) anywhere under `vault_dir` named `name`.
pub fn search_vault(vault_dir: &Path, name: &str) -> Option<PathBuf> {
    let pattern = format!(
        "{}/**/{}",
        glob::Pattern::escape(&vault_dir.to_string_lossy()),
        glob::Pattern::escape(name)
    );
    let mut matches: Vec<PathBuf> = glob::glob(&pattern)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// The delimited contents of `path`, or an error note for the model.
pub fn embed_file(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let shown = path.display();
            format!("\n{shown}>>>\n{contents}\n<<<{shown}\n")
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => format!(
            "Error: The file {} does not exist. Tell this to the user very briefly, \
             telling them the path that does not exist, ignoring the rest of the prompt.",
            path.display()
        ),
        Err(e) => format!(
            "Error: The file {} could not be read ({}). Tell this to the user very briefly, \
             ignoring the rest of the prompt.",
            path.display(),
            e
        ),
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    }
}
