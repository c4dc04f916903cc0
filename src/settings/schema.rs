//! Settings schema definitions for ctxwin configuration.
//!
//! All settings structs use `#[serde(default)]` to allow partial configuration files.
//! Missing fields are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::context::compression::{DEFAULT_EVENT_CAPACITY, DEFAULT_RECENT_EVENTS};
use crate::context::compression::strategies::DEFAULT_PRESERVE_RATIO;
use crate::context::context_selector::DEFAULT_MAX_CONTEXT_PERCENTAGE;
use crate::context::model_limits::{ModelCatalog, ModelLimits, FALLBACK_MODEL};
use crate::context::token_usage::{AlertThresholds, UsageCalculator};
use crate::context::ContextSelector;

/// Root settings structure.
///
/// Loaded from `~/.ctxwin/settings.toml` with environment variable interpolation support.
/// Version field enables future migrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtxwinSettings {
    /// Schema version for migrations
    pub version: u32,

    /// Model used when a caller does not name one; may be `$VAR`
    pub default_model: String,

    /// Context budget and alert thresholds
    pub usage: UsageSettings,

    /// Compression engine configuration
    pub compression: CompressionSettings,

    /// Per-model limit overrides, keyed by model id
    #[serde(default)]
    pub models: HashMap<String, ModelOverride>,

    /// Advanced/debug settings
    pub advanced: AdvancedSettings,
}

/// Context budget and alert thresholds, in percent of the context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSettings {
    /// Share of the window the context selector may fill
    pub max_context_percentage: u32,
    pub warning_threshold: u32,
    pub alert_threshold: u32,
    pub critical_threshold: u32,
}

/// Compression engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    /// Events kept in the engine's ring buffer
    pub event_log_capacity: usize,

    /// Events reported as recent compressions
    pub recent_events: usize,

    /// Sentence share kept when a semantic plan names no ratio
    pub default_preserve_ratio: f64,
}

/// Limits for one model, replacing or extending the built-in table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelOverride {
    pub context_window: u32,
    pub max_output: u32,
    /// Cost per 1K input tokens
    #[serde(default)]
    pub input_price: f64,
    /// Cost per 1K output tokens
    #[serde(default)]
    pub output_price: f64,
}

/// Advanced configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Log level: "error" | "warn" | "info" | "debug" | "trace"
    pub log_level: String,
}

// =============================================================================
// Default implementations
// =============================================================================

impl Default for CtxwinSettings {
    fn default() -> Self {
        Self {
            version: 1,
            default_model: FALLBACK_MODEL.to_string(),
            usage: UsageSettings::default(),
            compression: CompressionSettings::default(),
            models: HashMap::new(),
            advanced: AdvancedSettings::default(),
        }
    }
}

impl Default for UsageSettings {
    fn default() -> Self {
        let thresholds = AlertThresholds::default();
        Self {
            max_context_percentage: DEFAULT_MAX_CONTEXT_PERCENTAGE,
            warning_threshold: thresholds.warning,
            alert_threshold: thresholds.alert,
            critical_threshold: thresholds.critical,
        }
    }
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            event_log_capacity: DEFAULT_EVENT_CAPACITY,
            recent_events: DEFAULT_RECENT_EVENTS,
            default_preserve_ratio: DEFAULT_PRESERVE_RATIO,
        }
    }
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// =============================================================================
// Wiring into the context services
// =============================================================================

impl From<ModelOverride> for ModelLimits {
    fn from(value: ModelOverride) -> Self {
        ModelLimits::new(
            value.context_window,
            value.max_output,
            value.input_price,
            value.output_price,
        )
    }
}

impl UsageSettings {
    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            warning: self.warning_threshold,
            alert: self.alert_threshold,
            critical: self.critical_threshold,
        }
    }
}

impl CtxwinSettings {
    /// Built-in model table with the `[models]` overrides applied
    pub fn model_catalog(&self) -> ModelCatalog {
        ModelCatalog::with_overrides(
            self.models
                .iter()
                .map(|(id, limits)| (id.clone(), ModelLimits::from(*limits)))
                .collect(),
        )
    }

    pub fn usage_calculator(&self) -> UsageCalculator {
        UsageCalculator::new(self.model_catalog(), self.usage.thresholds())
    }

    pub fn context_selector(&self) -> ContextSelector {
        ContextSelector::new(self.model_catalog(), self.usage.max_context_percentage)
    }
}
