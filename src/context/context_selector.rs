//! Recency-biased context selection
//!
//! Decides which messages of a conversation are sent verbatim under a token
//! budget. The newest messages are guaranteed a slot; older messages are
//! added newest-first until the budget runs out. When eviction alone leaves
//! headroom unused the selection reports that compression would help.

use serde::{Deserialize, Serialize};

use super::model_limits::ModelCatalog;
use super::token_estimator::estimate_token_count;
use super::token_usage::document_tokens;
use super::types::{DocumentContext, Message};

/// Default share of the context window the selection may fill
pub const DEFAULT_MAX_CONTEXT_PERCENTAGE: u32 = 85;
/// Number of newest messages that are never evicted outside emergencies
pub const GUARANTEED_RECENT_MESSAGES: usize = 4;

/// How the selection trimmed the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruningStrategy {
    /// Everything fits
    None,
    /// Oldest messages were evicted and the budget is exactly filled
    OldestFirst,
    /// The guaranteed recent messages alone overflow the budget
    Emergency,
    /// Messages were evicted while budget remains; summarizing them would
    /// recover more history
    CompressionNeeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionTokenStats {
    /// Included conversation tokens plus fixed costs
    pub total: u32,
    pub system: u32,
    pub rag: u32,
    /// Tokens of the included messages
    pub conversation: u32,
    /// Budget left under the allowed maximum
    pub available: u32,
}

/// Result of a context selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSelection {
    /// Kept messages, in chronological order
    pub included_messages: Vec<Message>,
    /// Evicted messages, in their original order
    pub excluded_messages: Vec<Message>,
    pub token_stats: SelectionTokenStats,
    pub pruning_strategy: PruningStrategy,
}

/// Context selector bound to a model catalog and a budget percentage
#[derive(Debug, Clone)]
pub struct ContextSelector {
    catalog: ModelCatalog,
    max_context_percentage: u32,
}

impl Default for ContextSelector {
    fn default() -> Self {
        Self::new(ModelCatalog::new(), DEFAULT_MAX_CONTEXT_PERCENTAGE)
    }
}

impl ContextSelector {
    pub fn new(catalog: ModelCatalog, max_context_percentage: u32) -> Self {
        Self {
            catalog,
            max_context_percentage,
        }
    }

    pub fn max_context_percentage(&self) -> u32 {
        self.max_context_percentage
    }

    /// Select the messages to send for `model_id`
    pub fn select(
        &self,
        messages: &[Message],
        system_prompt: &str,
        documents: &[DocumentContext],
        model_id: &str,
    ) -> ContextSelection {
        let limits = self.catalog.get(model_id);
        let max_allowed =
            (limits.context_window as u64 * self.max_context_percentage as u64 / 100) as i64;

        let system_tokens = estimate_token_count(system_prompt);
        let rag_tokens = document_tokens(documents);
        let fixed = system_tokens as i64 + rag_tokens as i64;
        let available_for_conversation = max_allowed - fixed;

        let tokens: Vec<i64> = messages.iter().map(|m| m.token_count() as i64).collect();

        // Newest first; the sort is stable so equal timestamps keep input order
        let mut order: Vec<usize> = (0..messages.len()).collect();
        order.sort_by(|&a, &b| messages[b].timestamp.cmp(&messages[a].timestamp));

        let guaranteed_len = order.len().min(GUARANTEED_RECENT_MESSAGES);
        let (guaranteed, older) = order.split_at(guaranteed_len);
        let guaranteed_tokens: i64 = guaranteed.iter().map(|&i| tokens[i]).sum();

        let mut included: Vec<usize> = Vec::with_capacity(messages.len());
        let mut conversation_tokens: i64 = 0;
        let mut strategy = PruningStrategy::None;

        if guaranteed_tokens + fixed > max_allowed {
            strategy = PruningStrategy::Emergency;
            for &idx in guaranteed {
                if conversation_tokens + tokens[idx] + fixed > max_allowed {
                    break;
                }
                conversation_tokens += tokens[idx];
                included.push(idx);
            }
            tracing::warn!(
                "Recent messages ({} tokens) plus fixed context ({} tokens) exceed {} allowed tokens, kept {} of {}",
                guaranteed_tokens,
                fixed,
                max_allowed,
                included.len(),
                guaranteed_len
            );
        } else {
            included.extend_from_slice(guaranteed);
            conversation_tokens = guaranteed_tokens;

            for &idx in older {
                if conversation_tokens + tokens[idx] > available_for_conversation {
                    strategy = PruningStrategy::OldestFirst;
                    break;
                }
                conversation_tokens += tokens[idx];
                included.push(idx);
            }
        }

        included.sort_by(|&a, &b| {
            messages[a]
                .timestamp
                .cmp(&messages[b].timestamp)
                .then(a.cmp(&b))
        });

        let mut is_included = vec![false; messages.len()];
        for &idx in &included {
            is_included[idx] = true;
        }
        let excluded_messages: Vec<Message> = messages
            .iter()
            .zip(&is_included)
            .filter(|(_, kept)| !**kept)
            .map(|(msg, _)| msg.clone())
            .collect();

        if excluded_messages.is_empty() {
            strategy = PruningStrategy::None;
        } else if strategy == PruningStrategy::OldestFirst
            && conversation_tokens < available_for_conversation
        {
            strategy = PruningStrategy::CompressionNeeded;
        }

        let total = conversation_tokens + fixed;
        let token_stats = SelectionTokenStats {
            total: clamp_u32(total),
            system: system_tokens,
            rag: rag_tokens,
            conversation: clamp_u32(conversation_tokens),
            available: clamp_u32(max_allowed - total),
        };

        tracing::debug!(
            "Context selection for {}: kept {}/{} messages, {} tokens, strategy {:?}",
            model_id,
            included.len(),
            messages.len(),
            token_stats.total,
            strategy
        );

        ContextSelection {
            included_messages: included.iter().map(|&i| messages[i].clone()).collect(),
            excluded_messages,
            token_stats,
            pruning_strategy: strategy,
        }
    }
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

/// Select the messages to send for `model_id` using built-in model limits
pub fn select_optimal_context(
    messages: &[Message],
    system_prompt: &str,
    documents: &[DocumentContext],
    model_id: &str,
    max_context_percentage: u32,
) -> ContextSelection {
    ContextSelector::new(ModelCatalog::new(), max_context_percentage).select(
        messages,
        system_prompt,
        documents,
        model_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::model_limits::ModelLimits;
    use crate::context::types::DocumentType;
    use chrono::{DateTime, Duration, Utc};

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// Messages with fixed token counts, oldest first, one minute apart
    fn history(token_counts: &[u32]) -> Vec<Message> {
        token_counts
            .iter()
            .enumerate()
            .map(|(i, &tokens)| {
                let ts = base_time() + Duration::minutes(i as i64);
                let mut msg = if i % 2 == 0 {
                    Message::user(format!("message {}", i), ts)
                } else {
                    Message::assistant(format!("message {}", i), ts)
                };
                msg.tokens = Some(tokens);
                msg
            })
            .collect()
    }

    fn selector(context_window: u32, percentage: u32) -> ContextSelector {
        let mut catalog = ModelCatalog::new();
        catalog.set_override("test-model", ModelLimits::new(context_window, 10, 0.0, 0.0));
        ContextSelector::new(catalog, percentage)
    }

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_everything_fits() {
        let messages = history(&[10, 10, 10, 10, 10, 10]);
        let selection = selector(100, 100).select(&messages, "", &[], "test-model");

        assert_eq!(selection.pruning_strategy, PruningStrategy::None);
        assert_eq!(selection.included_messages, messages);
        assert!(selection.excluded_messages.is_empty());
        assert_eq!(selection.token_stats.conversation, 60);
        assert_eq!(selection.token_stats.available, 40);
    }

    #[test]
    fn test_compression_needed_when_budget_left() {
        let messages = history(&[40, 30, 10, 10, 10, 10]);
        let selection = selector(100, 100).select(&messages, "", &[], "test-model");

        assert_eq!(selection.pruning_strategy, PruningStrategy::CompressionNeeded);
        assert_eq!(contents(&selection.excluded_messages), vec!["message 0"]);
        assert_eq!(selection.included_messages.len(), 5);
        assert_eq!(selection.token_stats.conversation, 70);
    }

    #[test]
    fn test_oldest_first_when_budget_exactly_filled() {
        let messages = history(&[31, 60, 10, 10, 10, 10]);
        let selection = selector(100, 100).select(&messages, "", &[], "test-model");

        assert_eq!(selection.pruning_strategy, PruningStrategy::OldestFirst);
        assert_eq!(selection.token_stats.conversation, 100);
        assert_eq!(selection.token_stats.available, 0);
        assert_eq!(contents(&selection.excluded_messages), vec!["message 0"]);
    }

    #[test]
    fn test_eviction_stops_at_first_overflow() {
        // message 1 overflows; message 0 would still fit but is never tried
        let messages = history(&[5, 80, 10, 10, 10, 10]);
        let selection = selector(100, 100).select(&messages, "", &[], "test-model");

        assert_eq!(selection.excluded_messages.len(), 2);
        assert_eq!(selection.pruning_strategy, PruningStrategy::CompressionNeeded);
    }

    #[test]
    fn test_emergency_keeps_only_guaranteed_messages() {
        // The last four alone exceed the 85-token allowance
        let messages = history(&[1, 1, 30, 30, 30, 30]);
        let selection = selector(100, 85).select(&messages, "", &[], "test-model");

        assert_eq!(selection.pruning_strategy, PruningStrategy::Emergency);
        // Newest first: 30 + 30 = 60, the third would make 90 > 85
        assert_eq!(contents(&selection.included_messages), vec!["message 4", "message 5"]);
        for msg in &selection.included_messages {
            assert!(messages[2..].contains(msg));
        }
        assert_eq!(selection.excluded_messages.len(), 4);
        assert_eq!(selection.token_stats.total, 60);
        assert_eq!(selection.token_stats.available, 25);
    }

    #[test]
    fn test_fixed_costs_reduce_conversation_budget() {
        let mut doc = DocumentContext::new("ref.txt", DocumentType::Txt, "reference");
        doc.token_count = Some(50);
        let messages = history(&[20, 10, 10, 10, 10]);

        // system prompt "hello world" is 3 tokens; 100 - 53 = 47 for conversation
        let selection = selector(100, 100).select(&messages, "hello world", &[doc], "test-model");

        assert_eq!(selection.token_stats.system, 3);
        assert_eq!(selection.token_stats.rag, 50);
        assert_eq!(selection.token_stats.conversation, 40);
        assert_eq!(selection.token_stats.total, 93);
        assert_eq!(selection.pruning_strategy, PruningStrategy::CompressionNeeded);
    }

    #[test]
    fn test_included_messages_are_chronological() {
        let mut messages = history(&[10, 10, 10]);
        messages.reverse();
        let selection = selector(100, 100).select(&messages, "", &[], "test-model");

        assert_eq!(
            contents(&selection.included_messages),
            vec!["message 0", "message 1", "message 2"]
        );
    }

    #[test]
    fn test_empty_history() {
        let selection = select_optimal_context(&[], "", &[], "gpt-4o", DEFAULT_MAX_CONTEXT_PERCENTAGE);
        assert_eq!(selection.pruning_strategy, PruningStrategy::None);
        assert_eq!(selection.token_stats.total, 0);
        assert_eq!(selection.token_stats.available, 108_800);
    }

    #[test]
    fn test_unknown_model_falls_back() {
        let messages = history(&[10, 10]);
        let selection = select_optimal_context(&messages, "", &[], "nope", 85);
        assert_eq!(selection.included_messages.len(), 2);
    }
}
