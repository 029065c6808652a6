//! The human side of the chat

use async_trait::async_trait;
use natter_ai::Role;

use crate::{error::Result, events::ChatEvent};

/// One read from the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Ctrl+C at the prompt; the line is discarded
    Interrupted,
    /// End of input
    Eof,
}

/// What the prompt should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInfo {
    pub role: Role,
    /// Author name, or "system" while the system prompt is read
    pub name: String,
    /// Tokens currently in the conversation
    pub token_count: usize,
    pub context_window: u32,
    pub narrate: bool,
}

impl PromptInfo {
    /// Share of the context window in use, in percent
    pub fn usage_percent(&self) -> f64 {
        if self.context_window == 0 {
            return 0.0;
        }
        self.token_count as f64 * 100.0 / self.context_window as f64
    }
}

/// Reads turns and answers from the operator and renders chat events
#[async_trait]
pub trait Operator: Send {
    /// Read the next turn for `prompt.role`.
    async fn read_turn(&mut self, prompt: &PromptInfo) -> Result<Input>;

    /// Ask a one-line question. `None` on end of input or interrupt.
    async fn ask(&mut self, question: &str) -> Result<Option<String>>;

    /// Render an event. Called in order, from the controller's task.
    fn show(&mut self, event: &ChatEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_percent() {
        let info = PromptInfo {
            role: Role::User,
            name: "ana".into(),
            token_count: 2048,
            context_window: 8192,
            narrate: false,
        };
        assert_eq!(info.usage_percent(), 25.0);

        let empty = PromptInfo {
            context_window: 0,
            ..info
        };
        assert_eq!(empty.usage_percent(), 0.0);
    }
}
