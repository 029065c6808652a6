//! Context trimming for long conversations
//!
//! Before each generation the conversation is cut down so that it fits the
//! model's context window. The first turn (the system prompt) always stays;
//! the remaining budget goes to the most recent turns, walking backwards.

use natter_ai::{Tokenizer, Turn};

use crate::conversation::Conversation;

/// Result of trimming a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct TrimResult {
    /// The kept turns, in their original order
    pub conversation: Conversation,
    /// Token count of the kept turns only
    pub token_count: usize,
    /// How many turns were dropped
    pub dropped: usize,
}

/// Token cost of a single turn. Only the content is counted.
pub fn turn_cost(turn: &Turn, tokenizer: &dyn Tokenizer) -> usize {
    tokenizer.count(&turn.content)
}

/// Token count of a whole conversation
pub fn count_tokens(conversation: &Conversation, tokenizer: &dyn Tokenizer) -> usize {
    conversation
        .iter()
        .map(|turn| turn_cost(turn, tokenizer))
        .sum()
}

/// Keep turn 0 plus the longest suffix of recent turns that fits `max_tokens`.
///
/// The walk stops at the first turn that does not fit, so the kept turns after
/// the first are always contiguous. If the first turn alone exceeds the budget
/// it is still kept and nothing else is.
pub fn trim(conversation: &Conversation, max_tokens: usize, tokenizer: &dyn Tokenizer) -> TrimResult {
    let turns = conversation.turns();
    let Some(first) = turns.first() else {
        return TrimResult {
            conversation: Conversation::new(),
            token_count: 0,
            dropped: 0,
        };
    };

    let mut token_count = turn_cost(first, tokenizer);
    let mut keep_from = turns.len();

    for (index, turn) in turns.iter().enumerate().skip(1).rev() {
        let cost = turn_cost(turn, tokenizer);
        if token_count + cost > max_tokens {
            break;
        }
        token_count += cost;
        keep_from = index;
    }

    let mut kept = Vec::with_capacity(1 + turns.len() - keep_from);
    kept.push(first.clone());
    kept.extend_from_slice(&turns[keep_from..]);

    if keep_from > 1 {
        tracing::debug!(
            "Trimmed {} turns to fit {} tokens ({} kept)",
            keep_from - 1,
            max_tokens,
            token_count
        );
    }

    TrimResult {
        conversation: Conversation::from_turns(kept),
        token_count,
        dropped: keep_from - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natter_ai::CharEstimate;

    /// One token per whitespace-separated word
    fn words(text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn conversation(contents: &[&str]) -> Conversation {
        let turns = contents
            .iter()
            .enumerate()
            .map(|(i, c)| match i {
                0 => Turn::system(*c),
                i if i % 2 == 1 => Turn::user(*c),
                _ => Turn::assistant(*c),
            })
            .collect();
        Conversation::from_turns(turns)
    }

    fn contents(conversation: &Conversation) -> Vec<&str> {
        conversation.iter().map(|t| t.content.as_str()).collect()
    }

    #[test]
    fn test_trim_empty() {
        let result = trim(&Conversation::new(), 10, &words);
        assert!(result.conversation.is_empty());
        assert_eq!(result.token_count, 0);
    }

    #[test]
    fn test_trim_everything_fits() {
        let chat = conversation(&["be nice", "hi there", "hello you"]);
        let result = trim(&chat, 100, &words);
        assert_eq!(result.conversation, chat);
        assert_eq!(result.token_count, 6);
        assert_eq!(result.dropped, 0);
    }

    #[test]
    fn test_trim_drops_oldest_after_system() {
        // costs: 2, 3, 3, 1
        let chat = conversation(&["be nice", "one two three", "four five six", "seven"]);
        let result = trim(&chat, 6, &words);
        assert_eq!(contents(&result.conversation), vec!["be nice", "four five six", "seven"]);
        assert_eq!(result.token_count, 6);
        assert_eq!(result.dropped, 1);
    }

    #[test]
    fn test_trim_stops_at_first_turn_that_does_not_fit() {
        // costs: 1, 1, 5, 1. The cheap turn 1 must not be kept once turn 2 is skipped.
        let chat = conversation(&["sys", "a", "b c d e f", "g"]);
        let result = trim(&chat, 4, &words);
        assert_eq!(contents(&result.conversation), vec!["sys", "g"]);
        assert_eq!(result.token_count, 2);
    }

    #[test]
    fn test_trim_keeps_oversized_system_turn() {
        let chat = conversation(&["a b c d e f", "hi"]);
        let result = trim(&chat, 3, &words);
        assert_eq!(contents(&result.conversation), vec!["a b c d e f"]);
        assert_eq!(result.token_count, 6);
    }

    #[test]
    fn test_trim_properties_hold_for_all_budgets() {
        let chat = conversation(&[
            "you are terse",
            "what is rust",
            "a language",
            "is it fast",
            "yes quite fast indeed",
            "thanks",
            "welcome",
        ]);
        let total = count_tokens(&chat, &words);
        let mut previous_len = 0;

        for budget in 0..=total + 2 {
            let result = trim(&chat, budget, &words);
            let kept = result.conversation.turns();

            // the system turn survives
            assert_eq!(kept[0], chat.turns()[0]);

            // within budget unless the system turn alone is too large
            let system_cost = words(&chat.turns()[0].content);
            if system_cost <= budget {
                assert!(result.token_count <= budget, "budget {}", budget);
            }
            assert_eq!(result.token_count, count_tokens(&result.conversation, &words));

            // the rest is a contiguous suffix
            let suffix = &kept[1..];
            let all = chat.turns();
            assert_eq!(suffix, &all[all.len() - suffix.len()..]);

            // larger budgets never keep fewer turns
            assert!(kept.len() >= previous_len, "budget {}", budget);
            previous_len = kept.len();
        }

        assert_eq!(previous_len, chat.len());
    }

    #[test]
    fn test_trim_with_char_estimate() {
        let chat = conversation(&["abcd", "abcdabcd", "abcd"]);
        let result = trim(&chat, 2, &CharEstimate);
        assert_eq!(contents(&result.conversation), vec!["abcd", "abcd"]);
    }
}
