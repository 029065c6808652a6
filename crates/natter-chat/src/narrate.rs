//! Narration seam

/// Speaks sentences aloud. `narrate` must return immediately; playback
/// happens elsewhere, in the order sentences were handed over.
pub trait Narrator: Send + Sync {
    fn narrate(&self, sentence: &str);
}

/// Narrator that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Narrator for Silent {
    fn narrate(&self, _sentence: &str) {}
}
