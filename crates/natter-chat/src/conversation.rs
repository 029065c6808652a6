//! Conversation state: the ordered turns of one chat.

use natter_ai::{Role, Turn};
use serde::{Deserialize, Serialize};

/// Ordered list of turns. Serialized as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn pop(&mut self) -> Option<Turn> {
        self.turns.pop()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    /// Role whose turn comes next.
    pub fn next_role(&self) -> Role {
        next_role(&self.turns)
    }
}

impl From<Vec<Turn>> for Conversation {
    fn from(turns: Vec<Turn>) -> Self {
        Self::from_turns(turns)
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

/// Decide who speaks next.
///
/// An empty conversation starts with the system prompt, a user turn is
/// answered by the assistant, and anything else hands the turn to the user.
pub fn next_role(turns: &[Turn]) -> Role {
    match turns.last() {
        None => Role::System,
        Some(turn) if turn.role == Role::User => Role::Assistant,
        Some(_) => Role::User,
    }
}
