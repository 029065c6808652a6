//! Streaming sentence segmentation
//!
//! Response text arrives in arbitrary fragments. The segmenter buffers it and
//! releases complete sentences as soon as their boundary is certain, so a
//! narrator can start speaking before the response has finished.

/// Characters that end a sentence when followed by a closer.
const TERMINALS: &[char] = &['.', '?', '!', ':', '。', '？', '！'];

/// Characters that confirm a preceding terminal as a boundary.
const CLOSERS: &[char] = &[' ', '\n', '"', '\''];

/// Byte offset just past the first sentence boundary in `text`.
///
/// A newline is always a boundary. A terminal character is a boundary only
/// when the next character is a closer; a newline closer belongs to the
/// sentence it ends. A terminal at the very end of `text` is undecided.
fn find_boundary(text: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if c == '\n' {
            return Some(index + c.len_utf8());
        }
        if TERMINALS.contains(&c) {
            match chars.peek() {
                Some(&(next_index, '\n')) => return Some(next_index + 1),
                Some(&(_, next)) if CLOSERS.contains(&next) => {
                    return Some(index + c.len_utf8());
                }
                _ => {}
            }
        }
    }
    None
}

/// Append `delta` to `buffer` and split off every completed sentence.
///
/// Returns the sentences in order together with the new buffer. Concatenating
/// the sentences and the buffer always gives back `buffer + delta`.
pub fn feed(buffer: &str, delta: &str) -> (Vec<String>, String) {
    let mut remaining = String::with_capacity(buffer.len() + delta.len());
    remaining.push_str(buffer);
    remaining.push_str(delta);

    let mut sentences = Vec::new();
    while let Some(end) = find_boundary(&remaining) {
        let rest = remaining.split_off(end);
        sentences.push(std::mem::replace(&mut remaining, rest));
    }
    (sentences, remaining)
}

/// Split a finished text into sentences, including the trailing remainder.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut segmenter = SentenceSegmenter::new();
    let mut sentences = segmenter.feed(text);
    sentences.extend(segmenter.finish());
    sentences
}

/// Stateful wrapper around [`feed`] for one response stream.
#[derive(Debug, Default, Clone)]
pub struct SentenceSegmenter {
    buffer: String,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next fragment; returns sentences completed by it.
    pub fn feed(&mut self, delta: &str) -> Vec<String> {
        let (sentences, buffer) = feed(&self.buffer, delta);
        self.buffer = buffer;
        sentences
    }

    /// End of stream: release whatever is left, if anything.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_by_char(text: &str) -> Vec<String> {
        let mut segmenter = SentenceSegmenter::new();
        let mut out = Vec::new();
        for c in text.chars() {
            out.extend(segmenter.feed(c.encode_utf8(&mut [0; 4])));
        }
        out.extend(segmenter.finish());
        out
    }

    #[test]
    fn test_feed_two_sentences() {
        let (sentences, rest) = feed("", "Hello world. How are you?\n");
        assert_eq!(sentences, vec!["Hello world.", " How are you?\n"]);
        assert_eq!(rest, "");
    }

    #[test]
    fn test_feed_keeps_undecided_terminal() {
        let (sentences, rest) = feed("", "Version 2.");
        assert!(sentences.is_empty());
        assert_eq!(rest, "Version 2.");

        let (sentences, rest) = feed(&rest, "5 is out. Next");
        assert_eq!(sentences, vec!["Version 2.5 is out."]);
        assert_eq!(rest, " Next");
    }

    #[test]
    fn test_feed_terminal_without_closer_is_not_boundary() {
        let (sentences, rest) = feed("", "see example.com for more");
        assert!(sentences.is_empty());
        assert_eq!(rest, "see example.com for more");
    }

    #[test]
    fn test_feed_bare_newline_is_boundary() {
        let (sentences, rest) = feed("", "- item one\n- item two");
        assert_eq!(sentences, vec!["- item one\n"]);
        assert_eq!(rest, "- item two");
    }

    #[test]
    fn test_feed_quote_closer() {
        let (sentences, rest) = feed("", "He said \"stop!\" and left.");
        assert_eq!(sentences, vec!["He said \"stop!"]);
        assert_eq!(rest, "\" and left.");
    }

    #[test]
    fn test_feed_colon_and_cjk_terminals() {
        let (sentences, _) = feed("", "Note: fine");
        assert_eq!(sentences, vec!["Note:"]);

        let (sentences, rest) = feed("", "こんにちは。 元気？\n");
        assert_eq!(sentences, vec!["こんにちは。", " 元気？\n"]);
        assert_eq!(rest, "");
    }

    #[test]
    fn test_feed_preserves_all_text() {
        let text = "First. Second!\nThird?  \"Fourth.\" fifth: sixth";
        let (sentences, rest) = feed("", text);
        assert_eq!(sentences.concat() + &rest, text);
    }

    #[test]
    fn test_chunking_does_not_change_result() {
        let texts = [
            "Hello world. How are you?\n",
            "One. Two? Three! Four: five\nsix",
            "Ends with a terminal.",
            "Pi is 3.14. Right?\n\nYes.",
            "日本語。 テスト！\n終わり",
            "quote: 'yes.' no",
        ];
        for text in texts {
            assert_eq!(char_by_char(text), split_sentences(text), "text: {:?}", text);
        }
    }

    #[test]
    fn test_segmenter_finish_flushes_remainder() {
        let mut segmenter = SentenceSegmenter::new();
        assert_eq!(segmenter.feed("Done."), Vec::<String>::new());
        assert_eq!(segmenter.finish(), Some("Done.".to_string()));
        assert_eq!(segmenter.finish(), None);
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("A. B"),
            vec!["A.".to_string(), " B".to_string()]
        );
        assert!(split_sentences("").is_empty());
    }
}
