//! Token usage reports for a pending request
//!
//! Splits the context window across system prompt, conversation history,
//! retrieved documents and the pending input, and prices the result.

use serde::{Deserialize, Serialize};

use super::model_limits::{ModelCatalog, ModelLimits};
use super::token_estimator::estimate_token_count;
use super::types::{DocumentContext, Message, Role};

/// Alert level for context window usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenAlertLevel {
    /// Below warning threshold
    Normal,
    /// At or above warning threshold but below alert
    Warning,
    /// At or above alert threshold but below critical
    Alert,
    /// Context window (nearly) exhausted
    Critical,
}

/// Percent thresholds for [`TokenAlertLevel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub warning: u32,
    pub alert: u32,
    pub critical: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warning: 70,
            alert: 85,
            critical: 95,
        }
    }
}

impl AlertThresholds {
    pub fn level_for(&self, percentage: u32) -> TokenAlertLevel {
        if percentage >= self.critical {
            TokenAlertLevel::Critical
        } else if percentage >= self.alert {
            TokenAlertLevel::Alert
        } else if percentage >= self.warning {
            TokenAlertLevel::Warning
        } else {
            TokenAlertLevel::Normal
        }
    }
}

/// Token counts for one request against a context window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub system_prompt: u32,
    pub conversation_history: u32,
    pub rag_context: u32,
    pub current_message: u32,
    pub total: u32,
    /// `max(0, context_window - total)`
    pub remaining: u32,
    /// Share of the context window in use, capped at 100
    pub percentage: u32,
}

/// Input/output split of the tokens seen so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBreakdown {
    /// Cumulative user message tokens
    pub input_tokens: u32,
    /// Cumulative assistant message tokens
    pub output_tokens: u32,
    pub rag_tokens: u32,
    pub current_input_tokens: u32,
    /// Reservation for the reply. Reported, never added to `total`.
    pub expected_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCosts {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

/// Component shares of the context window, in integer percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUtilization {
    pub conversation_history: u32,
    pub rag_context: u32,
    pub system_prompt: u32,
    /// `context_window - total`; negative once the window is overrun
    pub available_for_response: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedTokenUsage {
    pub model: String,
    #[serde(flatten)]
    pub usage: TokenUsage,
    pub breakdown: TokenBreakdown,
    pub costs: TokenCosts,
    pub context_utilization: ContextUtilization,
    pub alert_level: TokenAlertLevel,
}

/// Round a monetary amount to 4 decimal places
pub(crate) fn round_cost(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// `round(part / whole * 100)`, without the cap
fn share_of(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return if part == 0 { 0 } else { 100 };
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

/// Sum user and assistant message tokens. System messages are accounted
/// for as the system prompt, not as history.
pub(crate) fn split_history_tokens(messages: &[Message]) -> (u32, u32) {
    messages
        .iter()
        .fold((0u32, 0u32), |(input, output), msg| match msg.role {
            Role::User => (input.saturating_add(msg.token_count()), output),
            Role::Assistant => (input, output.saturating_add(msg.token_count())),
            Role::System => (input, output),
        })
}

pub(crate) fn document_tokens(documents: &[DocumentContext]) -> u32 {
    documents
        .iter()
        .fold(0u32, |acc, doc| acc.saturating_add(doc.tokens()))
}

fn build_usage(
    limits: &ModelLimits,
    system_prompt: u32,
    conversation_history: u32,
    rag_context: u32,
    current_message: u32,
) -> TokenUsage {
    let total = system_prompt
        .saturating_add(conversation_history)
        .saturating_add(rag_context)
        .saturating_add(current_message);

    TokenUsage {
        system_prompt,
        conversation_history,
        rag_context,
        current_message,
        total,
        remaining: limits.context_window.saturating_sub(total),
        percentage: share_of(total, limits.context_window).min(100),
    }
}

/// Usage calculator bound to a model catalog and alert thresholds
#[derive(Debug, Clone, Default)]
pub struct UsageCalculator {
    catalog: ModelCatalog,
    thresholds: AlertThresholds,
}

impl UsageCalculator {
    pub fn new(catalog: ModelCatalog, thresholds: AlertThresholds) -> Self {
        Self {
            catalog,
            thresholds,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn thresholds(&self) -> AlertThresholds {
        self.thresholds
    }

    /// Usage report with a pre-joined history string
    pub fn token_usage(
        &self,
        system_prompt: &str,
        history: &str,
        documents: &[DocumentContext],
        pending_input: &str,
        model_id: &str,
    ) -> TokenUsage {
        let limits = self.catalog.get(model_id);
        build_usage(
            &limits,
            estimate_token_count(system_prompt),
            estimate_token_count(history),
            document_tokens(documents),
            estimate_token_count(pending_input),
        )
    }

    /// Full usage report over a message list
    pub fn detailed_usage(
        &self,
        system_prompt: &str,
        messages: &[Message],
        documents: &[DocumentContext],
        pending_input: &str,
        model_id: &str,
    ) -> DetailedTokenUsage {
        let limits = self.catalog.get(model_id);

        let system_tokens = estimate_token_count(system_prompt);
        let (input_tokens, output_tokens) = split_history_tokens(messages);
        let rag_tokens = document_tokens(documents);
        let current_input_tokens = estimate_token_count(pending_input);
        let expected_output_tokens = current_input_tokens
            .saturating_mul(2)
            .min(limits.max_output);

        let conversation_tokens = input_tokens.saturating_add(output_tokens);
        let usage = build_usage(
            &limits,
            system_tokens,
            conversation_tokens,
            rag_tokens,
            current_input_tokens,
        );

        let priced_input = system_tokens
            .saturating_add(input_tokens)
            .saturating_add(current_input_tokens)
            .saturating_add(rag_tokens);
        let input_cost = limits.input_cost(priced_input);
        let output_cost = limits.output_cost(output_tokens);

        let context_utilization = ContextUtilization {
            conversation_history: share_of(conversation_tokens, limits.context_window),
            rag_context: share_of(rag_tokens, limits.context_window),
            system_prompt: share_of(system_tokens, limits.context_window),
            available_for_response: limits.context_window as i64 - usage.total as i64,
        };

        let alert_level = self.thresholds.level_for(usage.percentage);
        if alert_level != TokenAlertLevel::Normal {
            tracing::debug!(
                "Context usage for {} at {}% ({:?})",
                model_id,
                usage.percentage,
                alert_level
            );
        }

        DetailedTokenUsage {
            model: model_id.to_string(),
            usage,
            breakdown: TokenBreakdown {
                input_tokens,
                output_tokens,
                rag_tokens,
                current_input_tokens,
                expected_output_tokens,
            },
            costs: TokenCosts {
                input_cost: round_cost(input_cost),
                output_cost: round_cost(output_cost),
                total_cost: round_cost(input_cost + output_cost),
            },
            context_utilization,
            alert_level,
        }
    }
}

/// Usage report with a pre-joined history string, using built-in limits
pub fn calculate_token_usage(
    system_prompt: &str,
    history: &str,
    documents: &[DocumentContext],
    pending_input: &str,
    model_id: &str,
) -> TokenUsage {
    UsageCalculator::default().token_usage(system_prompt, history, documents, pending_input, model_id)
}

/// Full usage report over a message list, using built-in limits
pub fn calculate_detailed_token_usage(
    system_prompt: &str,
    messages: &[Message],
    documents: &[DocumentContext],
    pending_input: &str,
    model_id: &str,
) -> DetailedTokenUsage {
    UsageCalculator::default().detailed_usage(
        system_prompt,
        messages,
        documents,
        pending_input,
        model_id,
    )
}
