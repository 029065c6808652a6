//! Streaming event types

use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while a response is streamed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Next piece of response text
    Delta { text: String },
    /// A chunk arrived without usable text (role header, finish marker,
    /// unparseable payload)
    Skipped,
    /// The stream failed; no further events follow
    Error { message: String },
}

impl StreamEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        Self::Delta { text: text.into() }
    }
}

/// A live sequence of response fragments, ended by stream end
pub type FragmentStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;
