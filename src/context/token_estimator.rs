//! Heuristic token estimation
//!
//! Blends a word-based and a character-based estimate. Text that looks
//! structured (code, JSON, CSV, markup) leans on the character estimate,
//! prose leans on the word estimate. This is deliberately not a tokenizer:
//! every budget in the crate is computed from these numbers, so they only
//! need to be stable, not vendor-exact.

/// Tokens per whitespace-separated word
const TOKENS_PER_WORD: f64 = 1.3;
/// Characters per token for the character-based estimate
const CHARS_PER_TOKEN: f64 = 4.0;
/// Lower bound, in tokens per word, applied to the blended estimate
const MIN_TOKENS_PER_WORD: f64 = 0.75;

/// Characters whose presence marks text as structured
const STRUCTURE_CHARS: [char; 12] = ['{', '}', '[', ']', '(', ')', ',', ':', ';', '|', '<', '>'];

/// Check whether text contains structural punctuation
pub fn is_structured(text: &str) -> bool {
    text.chars().any(|c| STRUCTURE_CHARS.contains(&c))
}

/// Estimate the number of tokens in `text`.
///
/// Empty text is 0 tokens. The result is never below `ceil(words * 0.75)`.
pub fn estimate_token_count(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    let words = text.split_whitespace().count() as f64;
    let chars = text.chars().count() as f64;

    let word_based = words * TOKENS_PER_WORD;
    let char_based = chars / CHARS_PER_TOKEN;

    let weighted = if is_structured(text) {
        word_based * 0.3 + char_based * 0.7
    } else {
        word_based * 0.7 + char_based * 0.3
    };

    let floor = (words * MIN_TOKENS_PER_WORD).ceil();
    weighted.ceil().max(floor) as u32
}

/// Estimate tokens for several texts at once
pub fn estimate_tokens_batch(texts: &[&str]) -> Vec<u32> {
    texts.iter().map(|t| estimate_token_count(t)).collect()
}

/// Format a token count for compact display ("950", "1.2K", "3.4M")
pub fn format_token_count(tokens: u32) -> String {
    if tokens < 1_000 {
        return tokens.to_string();
    }

    // Unit is picked after rounding so 999_999 reads "1.0M", not "1000.0K"
    let thousands = tokens as f64 / 1_000.0;
    if (thousands * 10.0).round() < 10_000.0 {
        format!("{:.1}K", thousands)
    } else {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    }
}
