//! Chat event types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::conversation::Conversation;

/// One saved chat as shown by the list commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub name: String,
    /// Backups and other dot-files
    pub hidden: bool,
    /// Shortened content of the last turn
    pub preview: String,
}

/// Events emitted while a chat runs, for the terminal to render
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Print the whole conversation (start of a run, load, edit, restart)
    Transcript { conversation: Conversation },

    /// Old turns were dropped to fit the context window
    Trimmed { dropped: usize, token_count: usize },

    /// The assistant started answering
    GenerationStart { model: String },

    /// Starting the generation failed and will be retried
    Retrying {
        attempt: u32,
        max_retries: u32,
        error: String,
    },

    /// Next piece of the answer
    Delta { text: String },

    /// The answer is complete or was interrupted
    GenerationEnd { cancelled: bool },

    /// Narration was switched on or off
    SpeechToggled { enabled: bool },

    /// Saved chats
    ChatList { chats: Vec<ChatSummary> },

    /// The command table
    Help { text: String },

    /// The chat was written to disk
    Saved { name: String, path: PathBuf },

    /// Informational message
    Notice { message: String },

    /// A command failed; the chat continues
    Error { message: String },
}

impl ChatEvent {
    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
