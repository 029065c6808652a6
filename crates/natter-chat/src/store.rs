//! Persistence seam for chats and backups

use std::path::PathBuf;

use crate::{conversation::Conversation, error::Result, events::ChatSummary};

/// Length of the last-turn preview shown when listing chats
pub const PREVIEW_CHARS: usize = 100;

/// Where chats are saved, loaded, listed, and backed up
pub trait ChatStore: Send {
    /// Overwrite this run's backup. Returns the backup path, or `None` when
    /// there was nothing worth writing.
    fn backup(&mut self, conversation: &Conversation) -> Result<Option<PathBuf>>;

    /// Save under `name`, replacing any existing chat of that name.
    fn save(&mut self, name: &str, conversation: &Conversation) -> Result<PathBuf>;

    fn load(&self, name: &str) -> Result<Conversation>;

    fn exists(&self, name: &str) -> bool;

    /// Saved chats sorted by name. Hidden entries (backups) only when asked.
    fn list(&self, include_hidden: bool) -> Result<Vec<ChatSummary>>;
}

/// Chat names become file names: no separators, no leading dot.
pub fn is_valid_chat_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}

/// Single-line preview of a conversation's last turn
pub fn preview(conversation: &Conversation) -> String {
    let Some(last) = conversation.last() else {
        return String::new();
    };
    let flat: String = last
        .content
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    let flat = flat.trim();
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat.to_string()
    }
}
