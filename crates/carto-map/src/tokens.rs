//! Token counting for budget decisions.

use carto_core::{CartoError, Result};
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Counts tokens in rendered map text.
///
/// The budget selector only needs totals, so implementations are free to
/// approximate as long as they are deterministic for a given input.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize;
}

/// Token counter backed by the `cl100k_base` BPE vocabulary.
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Load the embedded `cl100k_base` vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`CartoError::Config`] if the vocabulary fails to load.
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base()
            .map_err(|e| CartoError::Config(format!("failed to load tokenizer: {e}")))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Rough counter assuming four characters per token. Used in tests and
/// anywhere loading the BPE vocabulary is not worth it.
///
/// # Examples
///
/// ```
/// use carto_map::tokens::{CharCounter, TokenCounter};
///
/// assert_eq!(CharCounter.count("abcdefgh"), 2);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CharCounter;

impl TokenCounter for CharCounter {
    fn count(&self, text: &str) -> usize {
        text.len() / 4
    }
}

/// Count tokens in `text`, sampling long inputs.
///
/// Texts shorter than 200 characters are counted exactly. Longer texts count
/// every `lines / 100`-th line and extrapolate by character length, which
/// keeps repeated budget probes over large renders cheap.
pub fn sampled_count(counter: &dyn TokenCounter, text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    if text.len() < 200 {
        return counter.count(text);
    }

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let step = (lines.len() / 100).max(1);
    let sample: String = lines.iter().step_by(step).copied().collect();

    let sample_tokens = counter.count(&sample) as f64;
    (sample_tokens / sample.len() as f64 * text.len() as f64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_counter_divides_by_four() {
        assert_eq!(CharCounter.count(""), 0);
        assert_eq!(CharCounter.count("abcd"), 1);
        assert_eq!(CharCounter.count("abcdefghij"), 2);
    }

    #[test]
    fn sampled_count_empty_is_zero() {
        assert_eq!(sampled_count(&CharCounter, ""), 0);
    }

    #[test]
    fn sampled_count_short_text_is_exact() {
        let text = "fn main() {}";
        assert_eq!(sampled_count(&CharCounter, text), CharCounter.count(text));
    }

    #[test]
    fn sampled_count_extrapolates_long_text() {
        // 300 identical lines of 8 chars: every sample has the same
        // tokens-per-char ratio, so the estimate lands on the exact count.
        let text = "abcdefg\n".repeat(300);
        let exact = CharCounter.count(&text);
        let estimated = sampled_count(&CharCounter, &text);
        let diff = exact.abs_diff(estimated);
        assert!(diff <= exact / 50, "estimate {estimated} too far from {exact}");
    }

    #[test]
    fn sampled_count_handles_text_without_newlines() {
        let text = "x".repeat(500);
        let estimated = sampled_count(&CharCounter, &text);
        assert_eq!(estimated, 125);
    }
}
