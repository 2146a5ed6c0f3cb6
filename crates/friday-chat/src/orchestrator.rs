//! Chat orchestrator: history, classification, dispatch, synthesis and
//! persistence for one user message.
//!
//! The orchestrator owns no conversation state; everything durable lives in
//! the conversation store and the handlers' own stores.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use friday_core::config::ChatConfig;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::classifier::IntentClassifier;
use crate::completion::Completion;
use crate::conversation::ConversationStore;
use crate::error::ChatError;
use crate::handler::HandlerRegistry;
use crate::types::{ChatContext, ChatResponse};

pub struct ChatOrchestrator {
    classifier: IntentClassifier,
    registry: HandlerRegistry,
    conversations: Arc<dyn ConversationStore>,
    completion: Arc<dyn Completion>,
    config: ChatConfig,
    synthesis_timeout: Duration,
}

impl ChatOrchestrator {
    pub fn new(
        classifier: IntentClassifier,
        registry: HandlerRegistry,
        conversations: Arc<dyn ConversationStore>,
        completion: Arc<dyn Completion>,
        config: ChatConfig,
        synthesis_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            registry,
            conversations,
            completion,
            config,
            synthesis_timeout,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Validate an incoming message.
    pub fn validate_message(&self, message: &str) -> Result<(), ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let len = message.chars().count();
        if len > self.config.max_message_length {
            return Err(ChatError::MessageTooLong {
                len,
                max: self.config.max_message_length,
            });
        }
        Ok(())
    }

    /// Answer `message` within `session_id` (a new session when `None`).
    ///
    /// Never fails: every error becomes a final answer the user can read.
    pub async fn handle(&self, session_id: Option<&str>, message: &str) -> ChatResponse {
        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if let Err(e) = self.validate_message(message) {
            let mut response = ChatResponse::final_answer(format!("❌ {}", e));
            response.session_id = session_id;
            return response;
        }
        let message = message.trim();

        let history = self
            .conversations
            .recent(&session_id, self.config.history_turns * 2)
            .unwrap_or_else(|e| {
                warn!(session_id = %session_id, error = %e, "Failed to load history");
                Vec::new()
            });
        let last_user_message = self
            .conversations
            .last_user_message(&session_id)
            .unwrap_or_else(|e| {
                warn!(session_id = %session_id, error = %e, "Failed to load last message");
                None
            });

        let intent = self
            .classifier
            .classify(message, last_user_message.as_deref())
            .await;
        let handler = self.registry.resolve(intent.action.name());
        info!(
            session_id = %session_id,
            action = intent.action.name(),
            handler = handler.name(),
            "Dispatching chat message"
        );

        let ctx = ChatContext {
            session_id: session_id.clone(),
            message: message.to_string(),
            intent: intent.clone(),
            history,
            last_user_message,
            now: Utc::now(),
        };

        // Run the handler in its own task so a panic is contained.
        let task_ctx = ctx.clone();
        let task_handler = handler.clone();
        let outcome =
            tokio::spawn(async move { task_handler.handle(&task_ctx).await }).await;

        let mut response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(handler = handler.name(), error = %e, "Handler failed");
                ChatResponse::final_answer(e.user_message())
            }
            Err(e) => {
                error!(handler = handler.name(), error = %e, "Handler panicked");
                ChatResponse::final_answer(format!("Something went wrong: {}", e))
            }
        };

        if !response.is_final {
            response = self.synthesize(&ctx, response).await;
        }
        response.intent = Some(intent);
        response.session_id = session_id.clone();

        if let Err(e) = self
            .conversations
            .append(&session_id, message, &response.answer)
        {
            warn!(session_id = %session_id, error = %e, "Failed to persist conversation");
        }
        response
    }

    /// One completion call turning handler context into the final answer.
    async fn synthesize(&self, ctx: &ChatContext, mut response: ChatResponse) -> ChatResponse {
        let system_prompt = response
            .system_prompt_override
            .clone()
            .unwrap_or_else(|| self.config.system_prompt.clone());
        let user_content = match &response.context_for_llm {
            Some(context) => format!("Context:\n{}\n\nQuestion: {}", context, ctx.message),
            None => ctx.message.clone(),
        };

        let result = tokio::time::timeout(
            self.synthesis_timeout,
            self.completion
                .complete(&system_prompt, &user_content, &ctx.history),
        )
        .await;

        let failure = match result {
            Ok(Ok(answer)) if !answer.trim().is_empty() => {
                debug!(chars = answer.len(), "Answer synthesized");
                response.answer = answer.trim().to_string();
                None
            }
            Ok(Ok(_)) => Some("the model returned an empty answer".to_string()),
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "no answer within {} seconds",
                self.synthesis_timeout.as_secs()
            )),
        };

        if let Some(reason) = failure {
            warn!(error = %reason, "Answer synthesis failed");
            if response.answer.trim().is_empty() {
                response.answer = format!("Something went wrong: {}", reason);
            }
        }
        response.is_final = true;
        response
    }
}
