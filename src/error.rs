use serde::Serialize;
use thiserror::Error;

use crate::context::compression::CompressionStrategy;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("{0} compression cannot be reversed")]
    NotReversible(CompressionStrategy),

    #[error("Payload was produced by {found} compression, expected {expected}")]
    StrategyMismatch {
        expected: CompressionStrategy,
        found: CompressionStrategy,
    },

    #[error("Payload holds {sentinels} phrase markers but {spellings} recorded spellings")]
    PhraseCountMismatch { sentinels: usize, spellings: usize },

    #[error("{0} compression rewrites the whole conversation, not single messages")]
    NotPerMessage(CompressionStrategy),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: i32, actual: i32 },

    #[error("Restored text is {actual} characters long, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Errors cross into UI code as plain messages
impl Serialize for ContextError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;
