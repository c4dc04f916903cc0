//! Cumulative token statistics for a whole conversation

use serde::{Deserialize, Serialize};

use super::model_limits::{ModelCatalog, ModelLimits};
use super::token_usage::round_cost;
use super::types::{Message, Role};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTokenStats {
    pub total_messages: usize,
    pub total_input_tokens: u32,
    pub total_output_tokens: u32,
    pub total_tokens: u32,
    pub average_input_tokens: f64,
    pub average_output_tokens: f64,
    /// Largest single-message token count
    pub longest_message: u32,
    /// Smallest single-message token count, 0 for an empty conversation
    pub shortest_message: u32,
    pub cumulative_cost: f64,
}

/// Aggregate statistics over every message of a conversation
pub fn calculate_conversation_stats(messages: &[Message], model_id: &str) -> ConversationTokenStats {
    conversation_stats_with_limits(messages, &ModelCatalog::new().get(model_id))
}

pub(crate) fn conversation_stats_with_limits(
    messages: &[Message],
    limits: &ModelLimits,
) -> ConversationTokenStats {
    let mut input_tokens = 0u32;
    let mut output_tokens = 0u32;
    let mut user_count = 0usize;
    let mut assistant_count = 0usize;
    let mut longest = 0u32;
    let mut shortest: Option<u32> = None;

    for msg in messages {
        let tokens = msg.token_count();
        match msg.role {
            Role::User => {
                input_tokens = input_tokens.saturating_add(tokens);
                user_count += 1;
            }
            Role::Assistant => {
                output_tokens = output_tokens.saturating_add(tokens);
                assistant_count += 1;
            }
            Role::System => {}
        }

        longest = longest.max(tokens);
        shortest = Some(shortest.map_or(tokens, |s| s.min(tokens)));
    }

    let cost = limits.input_cost(input_tokens) + limits.output_cost(output_tokens);

    ConversationTokenStats {
        total_messages: messages.len(),
        total_input_tokens: input_tokens,
        total_output_tokens: output_tokens,
        total_tokens: input_tokens.saturating_add(output_tokens),
        average_input_tokens: input_tokens as f64 / user_count.max(1) as f64,
        average_output_tokens: output_tokens as f64 / assistant_count.max(1) as f64,
        longest_message: longest,
        shortest_message: shortest.unwrap_or(0),
        cumulative_cost: round_cost(cost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_empty_conversation() {
        let stats = calculate_conversation_stats(&[], "gpt-4o");
        assert_eq!(stats.total_messages, 0);
        assert_eq!(stats.shortest_message, 0);
        assert_eq!(stats.longest_message, 0);
        assert_eq!(stats.average_input_tokens, 0.0);
        assert_eq!(stats.average_output_tokens, 0.0);
        assert_eq!(stats.cumulative_cost, 0.0);
    }

    #[test]
    fn test_sums_and_averages_by_role() {
        let now = Utc::now();
        let mut long_user = Message::user("long", now);
        long_user.tokens = Some(10);
        let messages = vec![
            Message::system("hello world", now),
            Message::user("hello world", now),
            long_user,
            Message::assistant("hello world", now),
        ];

        let stats = calculate_conversation_stats(&messages, "gpt-4o");
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.total_input_tokens, 13);
        assert_eq!(stats.total_output_tokens, 3);
        assert_eq!(stats.total_tokens, 16);
        assert_eq!(stats.average_input_tokens, 6.5);
        assert_eq!(stats.average_output_tokens, 3.0);
        assert_eq!(stats.longest_message, 10);
        assert_eq!(stats.shortest_message, 3);
    }

    #[test]
    fn test_only_user_messages_guard_output_average() {
        let now = Utc::now();
        let messages = vec![Message::user("hello world", now)];

        let stats = calculate_conversation_stats(&messages, "gpt-4o");
        assert_eq!(stats.average_output_tokens, 0.0);
        assert_eq!(stats.average_input_tokens, 3.0);
    }

    #[test]
    fn test_cumulative_cost_uses_model_pricing() {
        let now = Utc::now();
        let mut user = Message::user("q", now);
        user.tokens = Some(1_000);
        let mut assistant = Message::assistant("a", now);
        assistant.tokens = Some(2_000);

        let limits = ModelLimits::new(10_000, 1_000, 0.5, 1.5);
        let stats = conversation_stats_with_limits(&[user, assistant], &limits);
        assert_eq!(stats.cumulative_cost, 3.5);
    }
}
