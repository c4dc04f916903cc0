//! Model context windows, output caps and pricing
//!
//! Lookups never fail: an unknown model id resolves to the fallback entry
//! (`gpt-4o-mini`) so a usage report can always be produced.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model whose limits are used for unknown ids
pub const FALLBACK_MODEL: &str = "gpt-4o-mini";

/// Cost per 1K tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

/// Token limits and pricing for a single model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelLimits {
    pub context_window: u32,
    pub max_output: u32,
    pub pricing: ModelPricing,
}

impl ModelLimits {
    pub const fn new(context_window: u32, max_output: u32, input: f64, output: f64) -> Self {
        Self {
            context_window,
            max_output,
            pricing: ModelPricing { input, output },
        }
    }

    /// Unrounded cost of `tokens` input tokens
    pub fn input_cost(&self, tokens: u32) -> f64 {
        tokens as f64 / 1000.0 * self.pricing.input
    }

    /// Unrounded cost of `tokens` output tokens
    pub fn output_cost(&self, tokens: u32) -> f64 {
        tokens as f64 / 1000.0 * self.pricing.output
    }
}

const FALLBACK_LIMITS: ModelLimits = ModelLimits::new(128_000, 16_384, 0.000_15, 0.000_6);

/// Built-in model table, keyed by exact model id
const KNOWN_MODELS: &[(&str, ModelLimits)] = &[
    // OpenAI
    ("gpt-4o", ModelLimits::new(128_000, 16_384, 0.002_5, 0.01)),
    (FALLBACK_MODEL, FALLBACK_LIMITS),
    ("gpt-4-turbo", ModelLimits::new(128_000, 4_096, 0.01, 0.03)),
    ("gpt-4", ModelLimits::new(8_192, 4_096, 0.03, 0.06)),
    ("gpt-3.5-turbo", ModelLimits::new(16_385, 4_096, 0.000_5, 0.001_5)),
    ("o1-preview", ModelLimits::new(128_000, 32_768, 0.015, 0.06)),
    ("o1-mini", ModelLimits::new(128_000, 65_536, 0.003, 0.012)),
    // Anthropic
    ("claude-3-5-sonnet", ModelLimits::new(200_000, 8_192, 0.003, 0.015)),
    ("claude-3-5-haiku", ModelLimits::new(200_000, 8_192, 0.000_8, 0.004)),
    ("claude-3-opus", ModelLimits::new(200_000, 4_096, 0.015, 0.075)),
    ("claude-3-haiku", ModelLimits::new(200_000, 4_096, 0.000_25, 0.001_25)),
    // Google
    ("gemini-1.5-pro", ModelLimits::new(2_097_152, 8_192, 0.001_25, 0.005)),
    ("gemini-1.5-flash", ModelLimits::new(1_048_576, 8_192, 0.000_075, 0.000_3)),
    ("gemini-pro", ModelLimits::new(32_760, 8_192, 0.000_5, 0.001_5)),
    // Open weights
    ("llama-3.1-70b", ModelLimits::new(131_072, 4_096, 0.000_59, 0.000_79)),
    ("llama-3.1-8b", ModelLimits::new(131_072, 4_096, 0.000_05, 0.000_08)),
    ("mixtral-8x7b", ModelLimits::new(32_768, 4_096, 0.000_24, 0.000_24)),
    ("mistral-large", ModelLimits::new(128_000, 4_096, 0.002, 0.006)),
];

/// Look up limits in the built-in table, falling back for unknown ids
pub fn get_model_limits(model_id: &str) -> ModelLimits {
    builtin_limits(model_id).unwrap_or(FALLBACK_LIMITS)
}

/// Ids of every built-in model
pub fn known_models() -> impl Iterator<Item = &'static str> {
    KNOWN_MODELS.iter().map(|(id, _)| *id)
}

fn builtin_limits(model_id: &str) -> Option<ModelLimits> {
    KNOWN_MODELS
        .iter()
        .find(|(id, _)| *id == model_id)
        .map(|(_, limits)| *limits)
}

/// Where resolved limits came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelLimitsSource {
    Override,
    BuiltIn,
    Fallback,
}

/// Limits together with their provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedModelLimits {
    pub limits: ModelLimits,
    pub source: ModelLimitsSource,
}

/// Built-in table plus per-model overrides from settings.
///
/// Lookup order: exact override, exact built-in entry, fallback.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    overrides: HashMap<String, ModelLimits>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog with the given overrides
    pub fn with_overrides(overrides: HashMap<String, ModelLimits>) -> Self {
        Self { overrides }
    }

    pub fn set_override(&mut self, model_id: impl Into<String>, limits: ModelLimits) {
        self.overrides.insert(model_id.into(), limits);
    }

    pub fn remove_override(&mut self, model_id: &str) -> Option<ModelLimits> {
        self.overrides.remove(model_id)
    }

    pub fn resolve(&self, model_id: &str) -> ResolvedModelLimits {
        if let Some(limits) = self.overrides.get(model_id) {
            return ResolvedModelLimits {
                limits: *limits,
                source: ModelLimitsSource::Override,
            };
        }

        if let Some(limits) = builtin_limits(model_id) {
            return ResolvedModelLimits {
                limits,
                source: ModelLimitsSource::BuiltIn,
            };
        }

        tracing::debug!(
            "Unknown model '{}', using {} limits",
            model_id,
            FALLBACK_MODEL
        );
        ResolvedModelLimits {
            limits: FALLBACK_LIMITS,
            source: ModelLimitsSource::Fallback,
        }
    }

    pub fn get(&self, model_id: &str) -> ModelLimits {
        self.resolve(model_id).limits
    }
}
