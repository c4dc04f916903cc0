//! Bounded log of compression events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use super::CompressionStrategy;

pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// One compression call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub strategy: CompressionStrategy,
    pub original_tokens: u32,
    pub compressed_tokens: u32,
    /// Compressed length over original length, in characters
    pub compression_ratio: f64,
    /// Estimated share of information retained, 0.0 to 1.0
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub message_count: usize,
}

impl CompressionEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strategy: CompressionStrategy,
        original_tokens: u32,
        compressed_tokens: u32,
        compression_ratio: f64,
        accuracy: f64,
        conversation_id: Option<String>,
        message_count: usize,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            strategy,
            original_tokens,
            compressed_tokens,
            compression_ratio,
            accuracy,
            conversation_id,
            message_count,
        }
    }

    /// Negative when compression grew the text
    pub fn tokens_saved(&self) -> i64 {
        i64::from(self.original_tokens) - i64::from(self.compressed_tokens)
    }
}

/// Oldest-first ring of events; pushing past capacity drops the oldest
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<CompressionEvent>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventLog {
    /// A capacity of 0 is raised to 1
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: CompressionEvent) {
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &CompressionEvent> + ExactSizeIterator {
        self.events.iter()
    }

    /// Events in chronological order
    pub fn to_vec(&self) -> Vec<CompressionEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
