//! Centralized TOML-based settings for ctxwin.
//!
//! Settings are loaded from `~/.ctxwin/settings.toml` with environment variable
//! interpolation support, and feed the model catalog, alert thresholds, context
//! selector budget and compression engine capacity.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ctxwin::settings::SettingsManager;
//!
//! let manager = SettingsManager::new().await?;
//! let settings = manager.get().await;
//!
//! let calculator = settings.usage_calculator();
//! let engine = CompressionEngine::from_settings(&settings.compression);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{settings_path, SettingsManager};
pub use schema::{
    AdvancedSettings, CompressionSettings, CtxwinSettings, ModelOverride, UsageSettings,
};
