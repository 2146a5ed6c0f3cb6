//! Request and response types shared by the pipeline and its handlers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::Intent;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a handler may look at. Built once per request and never mutated.
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub session_id: String,
    pub message: String,
    pub intent: Intent,
    /// Prior turns, oldest first.
    pub history: Vec<Turn>,
    pub last_user_message: Option<String>,
    pub now: DateTime<Utc>,
}

/// Result of a handler, and after synthesis the answer returned to the caller.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub answer: String,
    pub session_id: String,
    pub used_rag: bool,
    pub used_web: bool,
    pub used_memory: bool,
    pub used_health: bool,
    /// Sources of retrieved context.
    pub context_chunks: Vec<String>,
    pub memory_items: Vec<String>,
    pub web_results: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    /// When false the orchestrator makes one synthesis call before replying.
    #[serde(skip)]
    pub is_final: bool,
    #[serde(skip)]
    pub context_for_llm: Option<String>,
    #[serde(skip)]
    pub system_prompt_override: Option<String>,
}

impl ChatResponse {
    /// A complete answer that goes to the user as is.
    pub fn final_answer(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            is_final: true,
            ..Default::default()
        }
    }

    /// Ask for synthesis, optionally grounded in `context`.
    pub fn needs_synthesis(context: Option<String>) -> Self {
        Self {
            context_for_llm: context.filter(|c| !c.trim().is_empty()),
            is_final: false,
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt_override = Some(prompt.into());
        self
    }
}
