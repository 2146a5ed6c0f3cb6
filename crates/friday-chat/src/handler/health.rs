use std::sync::Arc;

use async_trait::async_trait;

use super::ChatHandler;
use crate::collaborators::HealthProvider;
use crate::error::HandlerError;
use crate::types::{ChatContext, ChatResponse};

const HEALTH_SYSTEM_PROMPT: &str = "You are Friday, a concise personal assistant. Answer the \
    user's question about their health data using only the figures provided. Do not give \
    medical advice.";

/// Answers questions about sleep, activity and vitals from a health provider.
pub struct HealthHandler {
    provider: Option<Arc<dyn HealthProvider>>,
}

impl HealthHandler {
    pub fn new(provider: Option<Arc<dyn HealthProvider>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChatHandler for HealthHandler {
    fn name(&self) -> &'static str {
        "health"
    }

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        let provider = match &self.provider {
            Some(p) => p,
            None => return Ok(ChatResponse::final_answer("Health data is not connected.")),
        };
        let summary = provider
            .summary(&ctx.message, ctx.now)
            .await
            .map_err(|e| HandlerError::failed("read health data", e))?;

        let mut response =
            ChatResponse::needs_synthesis(Some(summary)).with_system_prompt(HEALTH_SYSTEM_PROMPT);
        response.used_health = true;
        Ok(response)
    }
}
