//! Compression strategies
//!
//! Pure text transformations. The engine wraps these with event recording.
//!
//! - Lossless: run-length encoding plus a phrase dictionary, fully reversible
//! - Semantic: keeps the leading share of sentences
//! - Summary: one key point per message
//! - Hybrid: summarized older messages plus losslessly compressed recent ones

use aho_corasick::{AhoCorasick, MatchKind};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::CompressionStrategy;
use crate::context::types::Message;
use crate::error::{ContextError, Result};

/// Runs at least this long are run-length encoded
const MIN_RUN_LENGTH: usize = 3;
/// Runs at least this long make content a lossless candidate
const REPETITIVE_RUN_LENGTH: usize = 6;
/// Longest run accepted when expanding `c[n]` markers
const MAX_EXPANDED_RUN: usize = 1 << 20;

/// Key point length when a message has no sentence boundary
const KEY_POINT_CHARS: usize = 100;
const MAX_KEY_POINTS: usize = 5;
/// Trailing messages kept verbatim (lossless) by the hybrid strategy
const HYBRID_RECENT_MESSAGES: usize = 3;

pub const DEFAULT_PRESERVE_RATIO: f64 = 0.7;

pub const SEMANTIC_ACCURACY_FACTOR: f64 = 0.9;
pub const SUMMARY_ACCURACY: f64 = 0.7;
pub const HYBRID_ACCURACY: f64 = 0.85;
pub const LOSSLESS_ACCURACY: f64 = 1.0;

/// Phrase dictionary: (phrase, sentinel)
pub const COMMON_PHRASES: [(&str, &str); 5] = [
    ("I understand", "§IU§"),
    ("can you help", "§CYH§"),
    ("thank you", "§TY§"),
    ("let me know", "§LMK§"),
    ("by the way", "§BTW§"),
];

static PHRASE_MATCHER: OnceLock<Option<AhoCorasick>> = OnceLock::new();
static SENTINEL_MATCHER: OnceLock<Option<AhoCorasick>> = OnceLock::new();

fn phrase_matcher() -> Option<&'static AhoCorasick> {
    PHRASE_MATCHER
        .get_or_init(|| {
            AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .match_kind(MatchKind::LeftmostFirst)
                .build(COMMON_PHRASES.iter().map(|(phrase, _)| *phrase))
                .map_err(|e| tracing::error!("Failed to build phrase matcher: {}", e))
                .ok()
        })
        .as_ref()
}

fn sentinel_matcher() -> Option<&'static AhoCorasick> {
    SENTINEL_MATCHER
        .get_or_init(|| {
            AhoCorasick::builder()
                .match_kind(MatchKind::LeftmostFirst)
                .build(COMMON_PHRASES.iter().map(|(_, sentinel)| *sentinel))
                .map_err(|e| tracing::error!("Failed to build sentinel matcher: {}", e))
                .ok()
        })
        .as_ref()
}

/// Length in characters
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// `compressed / original` in characters; 1.0 for empty input
pub(crate) fn length_ratio(original_chars: usize, compressed_chars: usize) -> f64 {
    if original_chars == 0 {
        1.0
    } else {
        compressed_chars as f64 / original_chars as f64
    }
}

// ============================================================================
// Lossless
// ============================================================================

/// Output of the lossless encoder
#[derive(Debug, Clone, PartialEq)]
pub struct LosslessEncoding {
    pub text: String,
    /// Source spellings of each substituted phrase, in order
    pub phrase_spellings: Vec<String>,
}

/// Replace runs of 3 or more identical characters with `c[n]`.
///
/// A literal `[` is written as `[[` so source text such as `arr[3]` never
/// reads back as a run marker. Runs longer than the decoder accepts are
/// split into several markers.
pub fn run_length_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let mut run = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }

        while run > 0 {
            let chunk = run.min(MAX_EXPANDED_RUN);
            if chunk >= MIN_RUN_LENGTH {
                push_unit(&mut out, c);
                out.push('[');
                out.push_str(&chunk.to_string());
                out.push(']');
            } else {
                for _ in 0..chunk {
                    push_unit(&mut out, c);
                }
            }
            run -= chunk;
        }
    }

    out
}

fn push_unit(out: &mut String, c: char) {
    if c == '[' {
        out.push_str("[[");
    } else {
        out.push(c);
    }
}

/// Expand `c[n]` markers back into runs and `[[` back into `[`
pub fn run_length_decode(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let mut next = i + 1;
        if c == '[' && chars.get(next) == Some(&'[') {
            next += 1;
        }

        match parse_run_marker(&chars, next) {
            Some((count, after)) => {
                out.extend(std::iter::repeat(c).take(count));
                i = after;
            }
            None => {
                out.push(c);
                i = next;
            }
        }
    }

    out
}

/// Parse `[digits]` starting at `start`; returns the count and the index after `]`
fn parse_run_marker(chars: &[char], start: usize) -> Option<(usize, usize)> {
    if chars.get(start) != Some(&'[') {
        return None;
    }

    let digits_start = start + 1;
    let mut end = digits_start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }

    if end == digits_start || chars.get(end) != Some(&']') {
        return None;
    }

    let count: usize = chars[digits_start..end]
        .iter()
        .collect::<String>()
        .parse()
        .ok()?;
    if count > MAX_EXPANDED_RUN {
        return None;
    }

    Some((count, end + 1))
}

/// Substitute dictionary phrases (case-insensitive) with sentinels
fn substitute_phrases(text: &str) -> LosslessEncoding {
    let Some(matcher) = phrase_matcher() else {
        return LosslessEncoding {
            text: text.to_string(),
            phrase_spellings: Vec::new(),
        };
    };

    let mut out = String::with_capacity(text.len());
    let mut spellings = Vec::new();
    let mut last = 0;

    for m in matcher.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        out.push_str(COMMON_PHRASES[m.pattern().as_usize()].1);
        spellings.push(text[m.start()..m.end()].to_string());
        last = m.end();
    }
    out.push_str(&text[last..]);

    LosslessEncoding {
        text: out,
        phrase_spellings: spellings,
    }
}

/// Put phrases back in place of sentinels.
///
/// With `spellings`, the k-th sentinel is replaced by the k-th spelling and
/// the counts must agree. Without, canonical dictionary spellings are used.
fn restore_phrases(text: &str, spellings: Option<&[String]>) -> Result<String> {
    let Some(matcher) = sentinel_matcher() else {
        return Ok(text.to_string());
    };

    let matches: Vec<_> = matcher.find_iter(text).collect();
    if let Some(spellings) = spellings {
        if spellings.len() != matches.len() {
            return Err(ContextError::PhraseCountMismatch {
                sentinels: matches.len(),
                spellings: spellings.len(),
            });
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (k, m) in matches.iter().enumerate() {
        out.push_str(&text[last..m.start()]);
        match spellings {
            Some(spellings) => out.push_str(&spellings[k]),
            None => out.push_str(COMMON_PHRASES[m.pattern().as_usize()].0),
        }
        last = m.end();
    }
    out.push_str(&text[last..]);

    Ok(out)
}

/// Run-length encode, then substitute common phrases
pub fn lossless_encode(text: &str) -> LosslessEncoding {
    substitute_phrases(&run_length_encode(text))
}

/// Reverse [`lossless_encode`] exactly, given the recorded spellings
pub fn lossless_decode(text: &str, phrase_spellings: &[String]) -> Result<String> {
    let restored = restore_phrases(text, Some(phrase_spellings))?;
    Ok(run_length_decode(&restored))
}

/// Reverse [`lossless_encode`] without recorded spellings.
///
/// Phrases come back in their dictionary casing.
pub fn lossless_decode_text(text: &str) -> String {
    match restore_phrases(text, None) {
        Ok(restored) => run_length_decode(&restored),
        Err(_) => run_length_decode(text),
    }
}

// ============================================================================
// Semantic
// ============================================================================

/// Split text into trimmed, non-empty sentences on `.`, `!` and `?`
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Keep the first `ceil(sentences * preserve_ratio)` sentences, joined by
/// `". "` with a trailing period.
///
/// Text with no sentences (empty, whitespace or bare punctuation) stays
/// empty rather than becoming a lone `"."`.
pub fn semantic_compress(text: &str, preserve_ratio: f64) -> String {
    let sentences = split_sentences(text);
    let keep = ((sentences.len() as f64 * preserve_ratio).ceil().max(0.0) as usize)
        .min(sentences.len());

    if keep == 0 {
        return String::new();
    }

    format!("{}.", sentences[..keep].join(". "))
}

// ============================================================================
// Summary
// ============================================================================

/// First sentence of the content, or its first 100 characters when it has
/// no sentence boundary
pub fn extract_key_point(content: &str) -> Option<String> {
    let point = if content.contains(['.', '!', '?']) {
        split_sentences(content).first().map(|s| s.to_string())
    } else {
        None
    };

    let point = point.unwrap_or_else(|| {
        content
            .chars()
            .take(KEY_POINT_CHARS)
            .collect::<String>()
            .trim()
            .to_string()
    });

    if point.is_empty() {
        None
    } else {
        Some(point)
    }
}

/// Deduplicated key points, at most five, in message order
pub fn extract_key_points(messages: &[Message]) -> Vec<String> {
    let mut points: Vec<String> = Vec::new();
    for msg in messages {
        if points.len() >= MAX_KEY_POINTS {
            break;
        }
        if let Some(point) = extract_key_point(&msg.content) {
            if !points.contains(&point) {
                points.push(point);
            }
        }
    }
    points
}

pub fn summarize_messages(messages: &[Message]) -> String {
    format!(
        "[SUMMARY] Key points: {}",
        extract_key_points(messages).join("; ")
    )
}

// ============================================================================
// Hybrid
// ============================================================================

/// Hybrid output before the recent section is packaged
#[derive(Debug, Clone, PartialEq)]
pub struct HybridEncoding {
    pub text: String,
    pub phrase_spellings: Vec<String>,
}

/// `role: content` lines
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summarize everything but the last three messages, losslessly compress
/// the last three
pub fn hybrid_compress(messages: &[Message]) -> HybridEncoding {
    let split = messages.len().saturating_sub(HYBRID_RECENT_MESSAGES);
    let (older, recent) = messages.split_at(split);

    let mut sections = Vec::with_capacity(2);
    if !older.is_empty() {
        sections.push(format!(
            "[EARLIER] {}",
            extract_key_points(older).join("; ")
        ));
    }

    let encoded = lossless_encode(&format_transcript(recent));
    sections.push(format!("[RECENT] {}", encoded.text));

    HybridEncoding {
        text: sections.join("\n\n"),
        phrase_spellings: encoded.phrase_spellings,
    }
}

// ============================================================================
// Recommendation
// ============================================================================

/// Options attached to a recommended strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_ratio: Option<f64>,
    #[serde(default)]
    pub include_checksum: bool,
}

/// A strategy with its options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionPlan {
    #[serde(rename = "type")]
    pub strategy: CompressionStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<CompressionOptions>,
}

impl CompressionPlan {
    pub fn lossless() -> Self {
        Self {
            strategy: CompressionStrategy::Lossless,
            options: None,
        }
    }

    pub fn semantic(preserve_ratio: f64) -> Self {
        Self {
            strategy: CompressionStrategy::Semantic,
            options: Some(CompressionOptions {
                preserve_ratio: Some(preserve_ratio),
                include_checksum: false,
            }),
        }
    }

    pub fn summary() -> Self {
        Self {
            strategy: CompressionStrategy::Summary,
            options: None,
        }
    }

    pub fn hybrid(preserve_ratio: f64, include_checksum: bool) -> Self {
        Self {
            strategy: CompressionStrategy::Hybrid,
            options: Some(CompressionOptions {
                preserve_ratio: Some(preserve_ratio),
                include_checksum,
            }),
        }
    }

    pub fn preserve_ratio(&self) -> Option<f64> {
        self.options.as_ref().and_then(|o| o.preserve_ratio)
    }

    pub fn include_checksum(&self) -> bool {
        self.options.as_ref().is_some_and(|o| o.include_checksum)
    }
}

/// Longest run of one repeated character
fn longest_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut prev = None;

    for c in text.chars() {
        if Some(c) == prev {
            current += 1;
        } else {
            current = 1;
            prev = Some(c);
        }
        longest = longest.max(current);
    }

    longest
}

fn contains_common_phrase(text: &str) -> bool {
    match phrase_matcher() {
        Some(matcher) => matcher.is_match(text),
        None => {
            let lower = text.to_lowercase();
            COMMON_PHRASES
                .iter()
                .any(|(phrase, _)| lower.contains(&phrase.to_lowercase()))
        }
    }
}

/// Whether text has repetition the lossless strategy exploits well
pub fn has_compressible_patterns(text: &str) -> bool {
    longest_run(text) >= REPETITIVE_RUN_LENGTH || contains_common_phrase(text)
}

/// Pick a strategy from the conversation size and content
pub fn recommend_strategy(messages: &[Message], token_count: u32) -> CompressionPlan {
    if token_count < 1_000 {
        return CompressionPlan::lossless();
    }

    let text = messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if has_compressible_patterns(&text) {
        return CompressionPlan::lossless();
    }

    if token_count < 5_000 {
        CompressionPlan::semantic(0.8)
    } else {
        CompressionPlan::hybrid(0.6, true)
    }
}
