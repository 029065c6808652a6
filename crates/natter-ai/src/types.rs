//! Core types for chat conversations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp format used for turn dates and backup file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%6f";

/// Current local time formatted with [`TIMESTAMP_FORMAT`].
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Get the role as the wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-attributed message in a conversation.
///
/// Serialized as `{role, model, user, date, content}`. Fields this type does
/// not know about are kept in `extra` so that loading and saving a chat file
/// written by another tool does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    /// Model that produced the turn (or was active when it was written)
    #[serde(default)]
    pub model: String,
    /// Display name of the human author
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Turn {
    /// Create a turn stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            model: String::new(),
            user: String::new(),
            date: timestamp(),
            content: content.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Set the producing model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the author display name
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Name shown next to the turn when printing a conversation
    pub fn display_name(&self) -> &str {
        match self.role {
            Role::System => "system",
            Role::User if !self.user.is_empty() => self.user.as_str(),
            Role::Assistant if !self.model.is_empty() => self.model.as_str(),
            role => role.as_str(),
        }
    }
}
