//! One compression engine per session
//!
//! Statistics never leak between sessions; each key owns its own engine.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::engine::CompressionEngine;
use crate::settings::CompressionSettings;

/// Thread-safe map from session key to engine
#[derive(Debug, Default)]
pub struct EngineRegistry {
    engines: Mutex<HashMap<String, Arc<Mutex<CompressionEngine>>>>,
    settings: Option<CompressionSettings>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engines created by this registry are configured from `settings`
    pub fn with_settings(settings: CompressionSettings) -> Self {
        Self {
            engines: Mutex::new(HashMap::new()),
            settings: Some(settings),
        }
    }

    /// Engine for `session`, created on first use
    pub fn engine_for(&self, session: &str) -> Arc<Mutex<CompressionEngine>> {
        let mut engines = self.engines.lock();
        engines
            .entry(session.to_string())
            .or_insert_with(|| {
                tracing::debug!("Creating compression engine for session {}", session);
                let engine = match &self.settings {
                    Some(settings) => CompressionEngine::from_settings(settings),
                    None => CompressionEngine::new(),
                };
                Arc::new(Mutex::new(engine))
            })
            .clone()
    }

    pub fn get(&self, session: &str) -> Option<Arc<Mutex<CompressionEngine>>> {
        self.engines.lock().get(session).cloned()
    }

    pub fn remove(&self, session: &str) -> Option<Arc<Mutex<CompressionEngine>>> {
        let removed = self.engines.lock().remove(session);
        if removed.is_some() {
            tracing::debug!("Removed compression engine for session {}", session);
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn sessions(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.engines.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}
