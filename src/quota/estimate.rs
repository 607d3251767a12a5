//! Cost estimation for prompts and voice clips.
//!
//! Both estimates are cheap, deterministic approximations computed before any
//! billed API call is made. The word heuristic is rough on purpose: the
//! quota is reconciled against the provider's actual reported usage after the
//! call, so the estimate only has to be in the right ballpark.

/// Average number of whitespace-delimited words per LLM token.
///
/// The usual rule of thumb for English text is ~0.75 words per token.
const WORDS_PER_TOKEN: f64 = 1.0 / 0.75;

/// Estimate the token cost of a completion prompt.
///
/// Splits the prompt on whitespace, counts the words, and converts at the
/// fixed [`WORDS_PER_TOKEN`] ratio, truncating toward zero. An empty or
/// whitespace-only prompt estimates to zero tokens, never an error.
pub fn completion_cost(prompt: &str) -> u64 {
    let words = prompt.split_whitespace().count();
    (words as f64 / WORDS_PER_TOKEN) as u64
}

/// Estimate the transcription cost of an audio clip in whole seconds.
///
/// Rounds the duration up to the next whole second. Zero or negative
/// durations estimate to zero.
pub fn transcription_cost(duration_secs: f64) -> u64 {
    if duration_secs <= 0.0 {
        return 0;
    }
    duration_secs.ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_word_prompt_is_one_token() {
        // 2 words * 0.75 = 1.5, truncated to 1
        assert_eq!(completion_cost("hello there"), 1);
    }

    #[test]
    fn test_empty_prompt_is_zero() {
        assert_eq!(completion_cost(""), 0);
    }

    #[test]
    fn test_whitespace_only_prompt_is_zero() {
        assert_eq!(completion_cost("   \t \n "), 0);
    }

    #[test]
    fn test_word_count_ignores_repeated_whitespace() {
        assert_eq!(
            completion_cost("what's   a simple\nrecipe for tacos?"),
            completion_cost("what's a simple recipe for tacos?")
        );
    }

    #[test]
    fn test_token_estimate_truncates_toward_zero() {
        // 100 words * 0.75 = 75 exactly
        let prompt = vec!["word"; 100].join(" ");
        assert_eq!(completion_cost(&prompt), 75);
        // 5 words * 0.75 = 3.75, truncated to 3
        assert_eq!(completion_cost("one two three four five"), 3);
    }

    #[test]
    fn test_fractional_duration_rounds_up() {
        assert_eq!(transcription_cost(14.2), 15);
        assert_eq!(transcription_cost(0.1), 1);
    }

    #[test]
    fn test_whole_second_duration_unchanged() {
        assert_eq!(transcription_cost(15.0), 15);
    }

    #[test]
    fn test_zero_and_negative_durations_are_zero() {
        assert_eq!(transcription_cost(0.0), 0);
        assert_eq!(transcription_cost(-3.5), 0);
    }
}
