//! Stateful compression service
//!
//! Wraps the pure strategies, records one event per call and keeps the
//! derived statistics current.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::event_log::{CompressionEvent, EventLog, DEFAULT_EVENT_CAPACITY};
use super::payload::CompressedPayload;
use super::statistics::CompressionStatistics;
use super::strategies::{
    self, char_len, length_ratio, CompressionPlan, DEFAULT_PRESERVE_RATIO, HYBRID_ACCURACY,
    LOSSLESS_ACCURACY, SEMANTIC_ACCURACY_FACTOR, SUMMARY_ACCURACY,
};
use super::CompressionStrategy;
use crate::context::token_estimator::estimate_token_count;
use crate::context::types::Message;
use crate::error::{ContextError, Result};
use crate::settings::CompressionSettings;

pub const DEFAULT_RECENT_EVENTS: usize = 10;

/// Result of a single compression call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOutcome {
    pub compressed: CompressedPayload,
    pub ratio: f64,
    pub accuracy: f64,
    pub event_id: String,
}

/// Result of rewriting messages in place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Indices of the rewritten messages
    pub rewritten: Vec<usize>,
    /// Payload per rewritten message, aligned with `rewritten`
    pub payloads: Vec<CompressedPayload>,
    /// None when every message was already compressed
    pub event_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompressionEngine {
    log: EventLog,
    statistics: CompressionStatistics,
    recent_limit: usize,
    default_preserve_ratio: f64,
}

impl Default for CompressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionEngine {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let log = EventLog::with_capacity(capacity);
        let statistics =
            CompressionStatistics::from_events(log.iter(), DEFAULT_RECENT_EVENTS, Utc::now());
        Self {
            log,
            statistics,
            recent_limit: DEFAULT_RECENT_EVENTS,
            default_preserve_ratio: DEFAULT_PRESERVE_RATIO,
        }
    }

    pub fn from_settings(settings: &CompressionSettings) -> Self {
        let mut engine = Self::with_capacity(settings.event_log_capacity);
        engine.recent_limit = settings.recent_events;
        engine.default_preserve_ratio = clamp_ratio(settings.default_preserve_ratio);
        engine.refresh_statistics();
        engine
    }

    // ========================================================================
    // Strategies
    // ========================================================================

    pub fn compress_lossless(&mut self, text: &str, conversation_id: Option<&str>) -> CompressionOutcome {
        let encoded = strategies::lossless_encode(text);
        let mut payload = CompressedPayload::new(
            CompressionStrategy::Lossless,
            encoded.text,
            char_len(text),
        );
        payload.phrase_spellings = encoded.phrase_spellings;

        self.finish(
            payload,
            estimate_token_count(text),
            LOSSLESS_ACCURACY,
            conversation_id,
            1,
        )
    }

    /// Restore the exact source text of a lossless payload
    pub fn decompress(&self, payload: &CompressedPayload) -> Result<String> {
        if !payload.strategy.is_reversible() {
            return Err(ContextError::NotReversible(payload.strategy));
        }
        payload.verify()?;

        let restored = strategies::lossless_decode(&payload.payload, &payload.phrase_spellings)?;
        let actual = char_len(&restored);
        if actual != payload.original_length {
            return Err(ContextError::LengthMismatch {
                expected: payload.original_length,
                actual,
            });
        }

        Ok(restored)
    }

    /// Decode lossless text whose payload was not kept.
    ///
    /// Phrases come back in dictionary casing.
    pub fn decompress_text(&self, text: &str) -> String {
        strategies::lossless_decode_text(text)
    }

    /// Restore a message rewritten by [`Self::compress_messages_in_place`].
    ///
    /// Uncompressed messages are left unchanged.
    pub fn restore_message(&self, message: &mut Message, payload: &CompressedPayload) -> Result<()> {
        let Some(found) = message.compression else {
            return Ok(());
        };
        if found != payload.strategy {
            return Err(ContextError::StrategyMismatch {
                expected: payload.strategy,
                found,
            });
        }

        message.content = self.decompress(payload)?;
        message.tokens = Some(estimate_token_count(&message.content));
        message.compression = None;
        Ok(())
    }

    pub fn compress_semantic(
        &mut self,
        text: &str,
        preserve_ratio: f64,
        conversation_id: Option<&str>,
    ) -> CompressionOutcome {
        let ratio = clamp_ratio(preserve_ratio);
        let payload = CompressedPayload::new(
            CompressionStrategy::Semantic,
            strategies::semantic_compress(text, ratio),
            char_len(text),
        );

        self.finish(
            payload,
            estimate_token_count(text),
            ratio * SEMANTIC_ACCURACY_FACTOR,
            conversation_id,
            1,
        )
    }

    pub fn compress_summary(&mut self, messages: &[Message], conversation_id: Option<&str>) -> CompressionOutcome {
        let payload = CompressedPayload::new(
            CompressionStrategy::Summary,
            strategies::summarize_messages(messages),
            char_len(&joined_contents(messages)),
        );

        self.finish(
            payload,
            total_tokens(messages),
            SUMMARY_ACCURACY,
            conversation_id,
            messages.len(),
        )
    }

    pub fn compress_hybrid(&mut self, messages: &[Message], conversation_id: Option<&str>) -> CompressionOutcome {
        self.hybrid(messages, false, conversation_id)
    }

    fn hybrid(
        &mut self,
        messages: &[Message],
        include_checksum: bool,
        conversation_id: Option<&str>,
    ) -> CompressionOutcome {
        let encoded = strategies::hybrid_compress(messages);
        let mut payload = CompressedPayload::new(
            CompressionStrategy::Hybrid,
            encoded.text,
            char_len(&joined_contents(messages)),
        );
        payload.phrase_spellings = encoded.phrase_spellings;
        if include_checksum {
            payload = payload.with_checksum();
        }

        self.finish(
            payload,
            total_tokens(messages),
            HYBRID_ACCURACY,
            conversation_id,
            messages.len(),
        )
    }

    // ========================================================================
    // Plans
    // ========================================================================

    pub fn recommend_strategy(&self, messages: &[Message], token_count: u32) -> CompressionPlan {
        strategies::recommend_strategy(messages, token_count)
    }

    /// Compress a whole conversation into one payload according to `plan`
    pub fn apply_plan(
        &mut self,
        messages: &[Message],
        plan: &CompressionPlan,
        conversation_id: Option<&str>,
    ) -> CompressionOutcome {
        match plan.strategy {
            CompressionStrategy::Lossless => {
                let mut outcome = self.compress_lossless(&joined_contents(messages), conversation_id);
                if plan.include_checksum() {
                    outcome.compressed = outcome.compressed.with_checksum();
                }
                outcome
            }
            CompressionStrategy::Semantic => {
                let ratio = plan.preserve_ratio().unwrap_or(self.default_preserve_ratio);
                let mut outcome =
                    self.compress_semantic(&joined_contents(messages), ratio, conversation_id);
                if plan.include_checksum() {
                    outcome.compressed = outcome.compressed.with_checksum();
                }
                outcome
            }
            CompressionStrategy::Summary => self.compress_summary(messages, conversation_id),
            CompressionStrategy::Hybrid => {
                self.hybrid(messages, plan.include_checksum(), conversation_id)
            }
        }
    }

    /// Rewrite each not-yet-compressed message with a per-message strategy.
    ///
    /// Records a single event for the batch. Summary and hybrid plans
    /// collapse the conversation and are rejected.
    pub fn compress_messages_in_place(
        &mut self,
        messages: &mut [Message],
        plan: &CompressionPlan,
        conversation_id: Option<&str>,
    ) -> Result<BatchOutcome> {
        if !plan.strategy.is_per_message() {
            return Err(ContextError::NotPerMessage(plan.strategy));
        }

        let ratio = clamp_ratio(plan.preserve_ratio().unwrap_or(self.default_preserve_ratio));
        let accuracy = match plan.strategy {
            CompressionStrategy::Semantic => ratio * SEMANTIC_ACCURACY_FACTOR,
            _ => LOSSLESS_ACCURACY,
        };

        let mut batch = BatchOutcome::default();
        let mut original_tokens = 0u32;
        let mut compressed_tokens = 0u32;
        let mut original_chars = 0usize;
        let mut compressed_chars = 0usize;

        for (index, msg) in messages.iter_mut().enumerate() {
            if msg.is_compressed() {
                continue;
            }

            let original_length = char_len(&msg.content);
            let mut payload = match plan.strategy {
                CompressionStrategy::Semantic => CompressedPayload::new(
                    CompressionStrategy::Semantic,
                    strategies::semantic_compress(&msg.content, ratio),
                    original_length,
                ),
                _ => {
                    let encoded = strategies::lossless_encode(&msg.content);
                    let mut payload = CompressedPayload::new(
                        CompressionStrategy::Lossless,
                        encoded.text,
                        original_length,
                    );
                    payload.phrase_spellings = encoded.phrase_spellings;
                    payload
                }
            };
            if plan.include_checksum() {
                payload = payload.with_checksum();
            }

            original_tokens = original_tokens.saturating_add(msg.token_count());
            original_chars += original_length;

            msg.content = payload.payload.clone();
            msg.tokens = Some(estimate_token_count(&msg.content));
            msg.compression = Some(plan.strategy);

            compressed_tokens = compressed_tokens.saturating_add(msg.token_count());
            compressed_chars += payload.compressed_length();

            batch.rewritten.push(index);
            batch.payloads.push(payload);
        }

        if batch.rewritten.is_empty() {
            tracing::debug!("No uncompressed messages to rewrite");
            return Ok(batch);
        }

        let event = CompressionEvent::new(
            plan.strategy,
            original_tokens,
            compressed_tokens,
            length_ratio(original_chars, compressed_chars),
            accuracy,
            conversation_id.map(str::to_string),
            batch.rewritten.len(),
            Utc::now(),
        );
        batch.event_id = Some(self.record_event(event));

        Ok(batch)
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    pub fn statistics(&self) -> &CompressionStatistics {
        &self.statistics
    }

    /// Logged events, oldest first
    pub fn events(&self) -> Vec<CompressionEvent> {
        self.log.to_vec()
    }

    pub fn clear(&mut self) {
        self.log.clear();
        self.refresh_statistics();
        tracing::info!("Compression history cleared");
    }

    pub fn export_statistics_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.statistics)?)
    }

    fn finish(
        &mut self,
        compressed: CompressedPayload,
        original_tokens: u32,
        accuracy: f64,
        conversation_id: Option<&str>,
        message_count: usize,
    ) -> CompressionOutcome {
        let ratio = length_ratio(compressed.original_length, compressed.compressed_length());
        let event = CompressionEvent::new(
            compressed.strategy,
            original_tokens,
            estimate_token_count(&compressed.payload),
            ratio,
            accuracy,
            conversation_id.map(str::to_string),
            message_count,
            Utc::now(),
        );
        let event_id = self.record_event(event);

        CompressionOutcome {
            compressed,
            ratio,
            accuracy,
            event_id,
        }
    }

    fn record_event(&mut self, event: CompressionEvent) -> String {
        tracing::debug!(
            "Recorded {} compression: {} -> {} tokens (ratio {:.2})",
            event.strategy,
            event.original_tokens,
            event.compressed_tokens,
            event.compression_ratio
        );

        let id = event.id.clone();
        self.log.push(event);
        self.refresh_statistics();
        id
    }

    fn refresh_statistics(&mut self) {
        self.statistics =
            CompressionStatistics::from_events(self.log.iter(), self.recent_limit, Utc::now());
    }
}

fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        DEFAULT_PRESERVE_RATIO
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

fn joined_contents(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn total_tokens(messages: &[Message]) -> u32 {
    messages
        .iter()
        .fold(0u32, |sum, m| sum.saturating_add(m.token_count()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Vec<Message> {
        let now = Utc::now();
        vec![
            Message::user("Can you help me plan a trip. I want to see mountains.", now),
            Message::assistant("Sure. The Alps are a good choice!", now),
            Message::user("thank you. What about food?", now),
            Message::assistant("Try fondue. It is famous there.", now),
            Message::user("Great, let me know more later.", now),
        ]
    }

    #[test]
    fn test_lossless_round_trip() {
        let mut engine = CompressionEngine::new();
        let text = "Thank You!!! aaaaaa by the way... I UNDERSTAND";

        let outcome = engine.compress_lossless(text, Some("conv-1"));
        assert!(outcome.compressed.payload.contains("§TY§"));
        assert!(outcome.compressed.payload.contains("a[6]"));
        assert!(outcome.ratio < 1.0);
        assert_eq!(outcome.accuracy, 1.0);

        assert_eq!(engine.decompress(&outcome.compressed).unwrap(), text);
    }

    #[test]
    fn test_lossless_round_trip_bracketed_index() {
        let mut engine = CompressionEngine::new();
        let text = "let x = arr[3];";

        let outcome = engine.compress_lossless(text, None);
        assert_eq!(engine.decompress(&outcome.compressed).unwrap(), text);
        assert_eq!(engine.decompress_text(&outcome.compressed.payload), text);

        let mut messages = vec![Message::user("note[12] says thank you", Utc::now())];
        let batch = engine
            .compress_messages_in_place(&mut messages, &CompressionPlan::lossless(), None)
            .unwrap();
        engine
            .restore_message(&mut messages[0], &batch.payloads[0])
            .unwrap();
        assert_eq!(messages[0].content, "note[12] says thank you");
    }

    #[test]
    fn test_lossless_empty_text() {
        let mut engine = CompressionEngine::new();
        let outcome = engine.compress_lossless("", None);
        assert_eq!(outcome.ratio, 1.0);
        assert_eq!(engine.decompress(&outcome.compressed).unwrap(), "");
    }

    #[test]
    fn test_decompress_rejects_lossy_payloads() {
        let mut engine = CompressionEngine::new();
        let outcome = engine.compress_semantic("One. Two. Three.", 0.5, None);

        assert!(matches!(
            engine.decompress(&outcome.compressed),
            Err(ContextError::NotReversible(CompressionStrategy::Semantic))
        ));
    }

    #[test]
    fn test_decompress_validates_length() {
        let mut engine = CompressionEngine::new();
        let mut payload = engine.compress_lossless("hello", None).compressed;
        payload.original_length = 99;

        assert!(matches!(
            engine.decompress(&payload),
            Err(ContextError::LengthMismatch {
                expected: 99,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_decompress_validates_checksum() {
        let mut engine = CompressionEngine::new();
        let mut payload = engine.compress_lossless("hello", None).compressed.with_checksum();
        payload.payload.push('x');

        assert!(matches!(
            engine.decompress(&payload),
            Err(ContextError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decompress_text_canonical_spelling() {
        let engine = CompressionEngine::new();
        assert_eq!(engine.decompress_text("§TY§ zzz[4]"), "thank you zzzzzz");
    }

    #[test]
    fn test_semantic_accuracy_scales_with_ratio() {
        let mut engine = CompressionEngine::new();
        let outcome = engine.compress_semantic("One. Two. Three. Four.", 0.5, None);

        assert_eq!(outcome.compressed.payload, "One. Two.");
        assert!((outcome.accuracy - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_summary_records_message_count() {
        let mut engine = CompressionEngine::new();
        let messages = conversation();
        let outcome = engine.compress_summary(&messages, Some("conv-1"));

        assert!(outcome.compressed.payload.starts_with("[SUMMARY] Key points: "));
        assert_eq!(outcome.accuracy, 0.7);

        let events = engine.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message_count, 5);
        assert_eq!(events[0].original_tokens, total_tokens(&messages));
        assert_eq!(events[0].conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(events[0].id, outcome.event_id);
    }

    #[test]
    fn test_hybrid_sections_and_checksum_from_plan() {
        let mut engine = CompressionEngine::new();
        let messages = conversation();

        let plain = engine.compress_hybrid(&messages, None);
        assert!(plain.compressed.payload.starts_with("[EARLIER] "));
        assert!(plain.compressed.payload.contains("\n\n[RECENT] "));
        assert!(plain.compressed.checksum.is_none());

        let planned = engine.apply_plan(&messages, &CompressionPlan::hybrid(0.6, true), None);
        assert!(planned.compressed.checksum.is_some());
        assert!(planned.compressed.verify().is_ok());
        assert_eq!(planned.accuracy, 0.85);
    }

    #[test]
    fn test_apply_semantic_plan_uses_default_ratio() {
        let mut engine = CompressionEngine::new();
        let now = Utc::now();
        let messages = vec![Message::user("A. B. C. D. E. F. G. H. I. J.", now)];
        let plan = CompressionPlan {
            strategy: CompressionStrategy::Semantic,
            options: None,
        };

        let outcome = engine.apply_plan(&messages, &plan, None);
        assert_eq!(outcome.compressed.payload, "A. B. C. D. E. F. G.");
    }

    #[test]
    fn test_in_place_skips_compressed_messages() {
        let mut engine = CompressionEngine::new();
        let mut messages = conversation();
        messages[1].compression = Some(CompressionStrategy::Semantic);
        let untouched = messages[1].content.clone();

        let batch = engine
            .compress_messages_in_place(&mut messages, &CompressionPlan::lossless(), Some("c"))
            .unwrap();

        assert_eq!(batch.rewritten, vec![0, 2, 3, 4]);
        assert_eq!(messages[1].content, untouched);
        assert_eq!(messages[2].content, "§TY§. What about food?");
        assert_eq!(messages[2].compression, Some(CompressionStrategy::Lossless));
        assert_eq!(messages[2].tokens, Some(estimate_token_count(&messages[2].content)));

        let events = engine.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message_count, 4);
        assert_eq!(batch.event_id.as_deref(), Some(events[0].id.as_str()));

        // Second pass has nothing left to do
        let again = engine
            .compress_messages_in_place(&mut messages, &CompressionPlan::lossless(), None)
            .unwrap();
        assert!(again.rewritten.is_empty());
        assert!(again.event_id.is_none());
        assert_eq!(engine.events().len(), 1);
    }

    #[test]
    fn test_in_place_restore_message() {
        let mut engine = CompressionEngine::new();
        let mut messages = conversation();
        let original = messages[2].content.clone();

        let batch = engine
            .compress_messages_in_place(&mut messages, &CompressionPlan::lossless(), None)
            .unwrap();
        engine
            .restore_message(&mut messages[2], &batch.payloads[2])
            .unwrap();

        assert_eq!(messages[2].content, original);
        assert!(!messages[2].is_compressed());
    }

    #[test]
    fn test_restore_message_strategy_mismatch() {
        let mut engine = CompressionEngine::new();
        let mut msg = Message::user("thank you", Utc::now());
        let payload = engine.compress_lossless("thank you", None).compressed;
        msg.compression = Some(CompressionStrategy::Semantic);

        assert!(matches!(
            engine.restore_message(&mut msg, &payload),
            Err(ContextError::StrategyMismatch {
                expected: CompressionStrategy::Lossless,
                found: CompressionStrategy::Semantic
            })
        ));
    }

    #[test]
    fn test_in_place_rejects_whole_conversation_strategies() {
        let mut engine = CompressionEngine::new();
        let mut messages = conversation();

        let result =
            engine.compress_messages_in_place(&mut messages, &CompressionPlan::summary(), None);
        assert!(matches!(
            result,
            Err(ContextError::NotPerMessage(CompressionStrategy::Summary))
        ));
        assert!(engine.events().is_empty());
    }

    #[test]
    fn test_event_log_capacity_bounds_history() {
        let mut engine = CompressionEngine::with_capacity(3);
        for _ in 0..5 {
            engine.compress_lossless("aaaa", None);
        }

        assert_eq!(engine.events().len(), 3);
        assert_eq!(engine.statistics().total_compressions, 3);
    }

    #[test]
    fn test_statistics_track_events() {
        let mut engine = CompressionEngine::new();
        engine.compress_lossless("hello hello", None);
        engine.compress_summary(&conversation(), None);

        let stats = engine.statistics();
        assert_eq!(stats.total_compressions, 2);
        assert_eq!(stats.compressions_by_type[&CompressionStrategy::Lossless], 1);
        assert_eq!(stats.compressions_by_type[&CompressionStrategy::Summary], 1);
        assert_eq!(stats.lossless_percentage, 50.0);
        assert_eq!(stats.recent_compressions.len(), 2);
        assert_eq!(
            stats.compressions_by_type.values().sum::<usize>(),
            stats.total_compressions
        );
        assert_eq!(stats.compression_history.daily[6].compressions, 2);
    }

    #[test]
    fn test_clear_resets_statistics() {
        let mut engine = CompressionEngine::new();
        engine.compress_lossless("hello", None);
        engine.clear();

        assert!(engine.events().is_empty());
        assert_eq!(engine.statistics().total_compressions, 0);
    }

    #[test]
    fn test_from_settings() {
        let settings = CompressionSettings {
            event_log_capacity: 2,
            recent_events: 1,
            default_preserve_ratio: 0.5,
        };
        let mut engine = CompressionEngine::from_settings(&settings);
        for _ in 0..3 {
            engine.compress_lossless("hello", None);
        }

        assert_eq!(engine.events().len(), 2);
        assert_eq!(engine.statistics().recent_compressions.len(), 1);
    }

    #[test]
    fn test_export_statistics_json() {
        let mut engine = CompressionEngine::new();
        engine.compress_lossless("hello", None);

        let json = engine.export_statistics_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["totalCompressions"], 1);
    }
}
