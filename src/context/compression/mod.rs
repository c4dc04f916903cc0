//! Conversation compression
//!
//! Four strategies trade fidelity for size:
//! - `lossless`: reversible run-length and phrase encoding
//! - `semantic`: keeps the leading share of sentences
//! - `summary`: a handful of key points
//! - `hybrid`: summary of older messages plus lossless recent ones
//!
//! [`CompressionEngine`] applies them and keeps a bounded event log that
//! feeds [`CompressionStatistics`].

mod engine;
mod event_log;
mod payload;
mod registry;
mod statistics;
pub mod strategies;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use engine::{BatchOutcome, CompressionEngine, CompressionOutcome, DEFAULT_RECENT_EVENTS};
pub use event_log::{CompressionEvent, EventLog, DEFAULT_EVENT_CAPACITY};
pub use payload::{calculate_checksum, verify_checksum, CompressedPayload};
pub use registry::EngineRegistry;
pub use statistics::{CompressionHistory, CompressionStatistics, HistoryBucket};
pub use strategies::{recommend_strategy, CompressionOptions, CompressionPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionStrategy {
    Lossless,
    Semantic,
    Summary,
    Hybrid,
}

impl CompressionStrategy {
    pub const ALL: [CompressionStrategy; 4] = [
        CompressionStrategy::Lossless,
        CompressionStrategy::Semantic,
        CompressionStrategy::Summary,
        CompressionStrategy::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionStrategy::Lossless => "lossless",
            CompressionStrategy::Semantic => "semantic",
            CompressionStrategy::Summary => "summary",
            CompressionStrategy::Hybrid => "hybrid",
        }
    }

    pub fn is_reversible(&self) -> bool {
        matches!(self, CompressionStrategy::Lossless)
    }

    /// Whether the strategy rewrites messages one at a time
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            CompressionStrategy::Lossless | CompressionStrategy::Semantic
        )
    }
}

impl fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
