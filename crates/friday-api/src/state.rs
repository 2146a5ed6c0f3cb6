//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use friday_action::TriggerStore;
use friday_chat::ChatOrchestrator;
use friday_core::config::FridayConfig;

/// Shared application state, cloned into every handler by axum.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FridayConfig>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub triggers: Arc<TriggerStore>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: FridayConfig,
        orchestrator: Arc<ChatOrchestrator>,
        triggers: Arc<TriggerStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            triggers,
            start_time: Instant::now(),
        }
    }

    /// The configured API key, if authentication is enabled.
    pub fn api_key(&self) -> Option<&str> {
        self.config
            .api
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
    }
}
