//! Generation backends

pub mod openai;

use crate::{FragmentStream, ModelProfile, Result, Turn};
use async_trait::async_trait;

/// Something that turns an ordered conversation into a streamed reply
#[async_trait]
pub trait Generator: Send + Sync {
    /// Start streaming a response. Failures to connect are returned here so
    /// callers can retry; failures after that arrive as
    /// [`StreamEvent::Error`](crate::StreamEvent::Error).
    async fn stream(&self, model: &ModelProfile, turns: &[Turn]) -> Result<FragmentStream>;
}
