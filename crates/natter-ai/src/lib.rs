//! natter-ai: language-model plumbing for natter
//!
//! Turn and role types, model profiles, token estimation, and a streaming
//! chat-completions client that yields text fragments as they arrive.

pub mod error;
pub mod models;
pub mod providers;
pub mod stream;
pub mod tokenizer;
pub mod types;

pub use error::{Error, Result};
pub use models::ModelProfile;
pub use providers::Generator;
pub use stream::{FragmentStream, StreamEvent};
pub use tokenizer::{Bpe, CharEstimate, Tokenizer};
pub use types::*;
