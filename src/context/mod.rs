//! Context window management
//!
//! Token estimation, per-model limits, usage reports, history selection and
//! compression for chat conversations.

pub mod compression;
pub mod context_selector;
pub mod conversation_stats;
pub mod model_limits;
pub mod token_estimator;
pub mod token_usage;
pub mod types;

pub use compression::{
    CompressedPayload, CompressionEngine, CompressionOutcome, CompressionPlan,
    CompressionStatistics, CompressionStrategy, EngineRegistry,
};
pub use context_selector::{
    select_optimal_context, ContextSelection, ContextSelector, PruningStrategy,
    SelectionTokenStats, DEFAULT_MAX_CONTEXT_PERCENTAGE,
};
pub use conversation_stats::{calculate_conversation_stats, ConversationTokenStats};
pub use model_limits::{
    get_model_limits, ModelCatalog, ModelLimits, ModelLimitsSource, ModelPricing,
    ResolvedModelLimits,
};
pub use token_estimator::{estimate_token_count, estimate_tokens_batch, format_token_count};
pub use token_usage::{
    calculate_detailed_token_usage, calculate_token_usage, AlertThresholds, DetailedTokenUsage,
    TokenAlertLevel, TokenUsage, UsageCalculator,
};
pub use types::{DocumentContext, DocumentType, Message, Role};
