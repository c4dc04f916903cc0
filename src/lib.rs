//! Context window accounting and conversation compression for AI chat.
//!
//! - [`context`]: token estimation, model limits, usage reports, history
//!   selection and compression
//! - [`settings`]: TOML configuration at `~/.ctxwin/settings.toml`
//! - [`telemetry`]: tracing subscriber setup

pub mod context;
pub mod error;
pub mod settings;
pub mod telemetry;

pub use context::{
    calculate_conversation_stats, calculate_detailed_token_usage, calculate_token_usage,
    estimate_token_count, get_model_limits, select_optimal_context, CompressionEngine,
    CompressionStrategy, ContextSelection, DetailedTokenUsage, DocumentContext, Message,
    ModelLimits, PruningStrategy, Role, TokenUsage,
};
pub use error::{ContextError, Result};
pub use settings::{CtxwinSettings, SettingsManager};
