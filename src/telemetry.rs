//! Tracing subscriber setup for applications embedding ctxwin.

use anyhow::{Context, Result};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::settings::AdvancedSettings;

const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Filter for `ctxwin` at `log_level`; `RUST_LOG` directives still apply.
///
/// Unknown levels fall back to `info`.
pub fn env_filter(log_level: &str) -> Result<EnvFilter> {
    let level = log_level.trim().to_ascii_lowercase();
    let level = if VALID_LEVELS.contains(&level.as_str()) {
        level
    } else {
        "info".to_string()
    };

    let directive = format!("ctxwin={}", level)
        .parse::<Directive>()
        .context("Invalid log directive")?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

/// Install a global fmt subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(log_level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level)?)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

/// [`init_tracing`] with the level from `[advanced]`
pub fn init_from_settings(settings: &AdvancedSettings) -> Result<()> {
    init_tracing(&settings.log_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_known_levels() {
        for level in VALID_LEVELS {
            assert!(env_filter(level).is_ok());
        }
        assert!(env_filter("DEBUG").is_ok());
    }

    #[test]
    fn test_env_filter_unknown_level_falls_back() {
        let filter = env_filter("loud").unwrap();
        assert!(filter.to_string().contains("ctxwin=info"));
    }

    #[test]
    fn test_second_init_fails() {
        // Only one global subscriber per process
        let _ = init_tracing("debug");
        assert!(init_tracing("debug").is_err());
    }
}
