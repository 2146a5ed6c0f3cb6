//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::completion::Completion;
use crate::error::CompletionError;
use crate::intent::Intent;
use crate::types::{ChatContext, Turn};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_content: String,
    pub history: Vec<Turn>,
}

/// Completion that replays queued results and records each call.
#[derive(Clone, Default)]
pub struct ScriptedCompletion {
    replies: Arc<Mutex<VecDeque<Result<String, CompletionError>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    delay: Option<Duration>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, reply: Result<String, CompletionError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
        history: &[Turn],
    ) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            user_content: user_content.to_string(),
            history: history.to_vec(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(CompletionError::EmptyResponse))
    }
}

/// A request context at a fixed instant.
pub fn context(message: &str, intent: Intent, now: DateTime<Utc>) -> ChatContext {
    ChatContext {
        session_id: "test-session".to_string(),
        message: message.to_string(),
        intent,
        history: vec![],
        last_user_message: None,
        now,
    }
}

/// Friday 2026-10-16 14:00 UTC.
pub fn friday_afternoon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 14, 0, 0).unwrap()
}
