//! Tagged compression output and integrity checksum

use serde::{Deserialize, Serialize};

use super::CompressionStrategy;
use crate::error::{ContextError, Result};

/// Compressed text tagged with the strategy that produced it.
///
/// Carrying the tag lets decompression refuse payloads it cannot reverse
/// instead of guessing from sentinel markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedPayload {
    pub strategy: CompressionStrategy,
    pub payload: String,
    /// Length of the source text in characters
    pub original_length: usize,
    /// Source spellings of substituted phrases, in payload order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phrase_spellings: Vec<String>,
    /// Checksum of `payload`, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<i32>,
}

impl CompressedPayload {
    pub fn new(strategy: CompressionStrategy, payload: String, original_length: usize) -> Self {
        Self {
            strategy,
            payload,
            original_length,
            phrase_spellings: Vec::new(),
            checksum: None,
        }
    }

    /// Attach a checksum of the current payload
    pub fn with_checksum(mut self) -> Self {
        self.checksum = Some(calculate_checksum(&self.payload));
        self
    }

    /// Payload length in characters
    pub fn compressed_length(&self) -> usize {
        self.payload.chars().count()
    }

    /// Verify the attached checksum; payloads without one always pass
    pub fn verify(&self) -> Result<()> {
        match self.checksum {
            Some(expected) => verify_checksum(&self.payload, expected),
            None => Ok(()),
        }
    }
}

/// 32-bit rolling hash over UTF-16 code units
/// (`hash = (hash << 5) - hash + code`, wrapping).
pub fn calculate_checksum(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32)
    })
}

pub fn verify_checksum(text: &str, expected: i32) -> Result<()> {
    let actual = calculate_checksum(text);
    if actual == expected {
        Ok(())
    } else {
        Err(ContextError::ChecksumMismatch { expected, actual })
    }
}
