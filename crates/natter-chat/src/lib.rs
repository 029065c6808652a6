//! natter-chat: the chat runtime for natter
//!
//! This crate owns a conversation for one interactive run: it decides whose
//! turn it is, trims the history to the model's context window, streams the
//! assistant's answer, and splits it into sentences for narration.

pub mod command;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod events;
pub mod expand;
pub mod generation;
pub mod handle;
pub mod narrate;
pub mod operator;
pub mod segment;
pub mod store;
pub mod transcript;
pub mod trim;

pub use command::Command;
pub use controller::{Controller, ControllerConfig, RunOutcome, Session};
pub use conversation::{Conversation, next_role};
pub use error::{Error, Result};
pub use events::{ChatEvent, ChatSummary};
pub use expand::Expander;
pub use generation::RetryPolicy;
pub use handle::ControllerHandle;
pub use narrate::{Narrator, Silent};
pub use operator::{Input, Operator, PromptInfo};
pub use segment::SentenceSegmenter;
pub use store::ChatStore;
pub use transcript::TranscriptEditor;
pub use trim::{TrimResult, trim};
