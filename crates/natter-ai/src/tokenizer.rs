//! Token counting used to price turns against a context window.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

/// Deterministic text -> token count.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count(&self, text: &str) -> usize {
        self(text)
    }
}

/// Estimate tokens as one per four characters, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimate;

impl Tokenizer for CharEstimate {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

/// Exact counts from the BPE encoding the model was trained with.
pub struct Bpe {
    bpe: CoreBPE,
}

impl Bpe {
    /// The encoding for `model`, if it is one tiktoken knows.
    pub fn for_model(model: &str) -> Option<Self> {
        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Some(Self { bpe }),
            Err(e) => {
                tracing::debug!("No BPE encoding for {}: {}", model, e);
                None
            }
        }
    }
}

impl Tokenizer for Bpe {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Tokenizer for `model`: its BPE encoding when known, else [`CharEstimate`].
pub fn for_model(model: &str) -> Arc<dyn Tokenizer> {
    match Bpe::for_model(model) {
        Some(bpe) => Arc::new(bpe),
        None => Arc::new(CharEstimate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_estimate() {
        assert_eq!(CharEstimate.count(""), 0);
        assert_eq!(CharEstimate.count("hi"), 1);
        assert_eq!(CharEstimate.count("Hello world!"), 3);
        assert_eq!(CharEstimate.count(&"x".repeat(401)), 101);
    }

    #[test]
    fn test_char_estimate_counts_chars_not_bytes() {
        // 5 chars, 15 bytes
        assert_eq!(CharEstimate.count("こんにちは"), 2);
        assert_eq!(CharEstimate.count("日本語だ"), 1);
    }

    #[test]
    fn test_bpe_counts_known_model() {
        let bpe = Bpe::for_model("gpt-4").unwrap();
        assert_eq!(bpe.count(""), 0);
        assert_eq!(bpe.count("hello world"), 2);
        assert!(bpe.count("a b c d") > CharEstimate.count("a b c d"));
    }

    #[test]
    fn test_bpe_resolves_dated_snapshot() {
        let dated = Bpe::for_model("gpt-4-0613").unwrap();
        assert_eq!(dated.count("hello world"), 2);
    }

    #[test]
    fn test_unknown_model_falls_back_to_char_estimate() {
        assert!(Bpe::for_model("llama-3-local").is_none());
        let tokenizer = for_model("llama-3-local");
        assert_eq!(tokenizer.count("Hello world!"), 3);
        assert_eq!(for_model("gpt-4").count("hello world"), 2);
    }

    #[test]
    fn test_closure_tokenizer() {
        let words = |text: &str| text.split_whitespace().count();
        assert_eq!(words.count("one two three"), 3);
    }
}
