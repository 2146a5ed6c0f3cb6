//! Maps a user message to a structured [`Intent`] with one routing call.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::completion::Completion;
use crate::error::ChatError;
use crate::intent::Intent;

const ROUTER_SYSTEM_PROMPT: &str = r#"You are the intent router of a personal assistant.
Read the user's message and reply with ONE JSON object and nothing else.

Fields:
  "action": one of general, web_search, time_query, health_query, calendar_query,
            reminder_create, reminder_query, reminder_delete, alert_create, alert_list,
            alert_delete, note_create, task_create, task_list, task_complete,
            memory_save, memory_list, memory_delete
  "tool": null or one of current_time, calendar_today, calendar_tomorrow, calendar_week,
          calendar_next, reminder_list, reminder_next, task_list, task_today, alert_list
  "use_rag": true when the answer may be in the user's notes
  "use_memory": true when the answer depends on facts about the user
  "reminder_data": {"message": "...", "time_spec": "in 30 minutes | at 3pm | at 15:40 | tomorrow at 9am"}
  "reminder_index": 0-based position for reminder_delete, -1 for the last, -999 for all
  "alert_data": {"title": "...", "description": "...", "trigger_date": "friday | 2026-11-02 | in 2 hours",
                 "trigger_condition": "...", "recurring": "daily | weekly | monthly | null",
                 "priority": "low | medium | high | urgent", "alert_id": "..."}
  "note_data": {"title": "...", "content": "...", "folder": "...", "tags": ["..."]}
  "task_data": {"title": "...", "priority": "...", "context": "home | work | gym | errands",
                "due_date": "today | tomorrow | YYYY-MM-DD", "task_id": "..."}
  "calendar_data": {"date": "YYYY-MM-DD", "range": "day | week"}
  "memory_data": {"content": "fact to remember, or text of the memory to forget", "memory_id": "..."}

Use PREVIOUS only to resolve follow-ups such as "and tomorrow?" or "delete it".

Examples:
USER: remind me to call mom in 30 minutes
OUTPUT: {"action":"reminder_create","tool":null,"use_rag":false,"use_memory":false,"reminder_data":{"message":"call mom","time_spec":"in 30 minutes"}}
USER: what time is it?
OUTPUT: {"action":"time_query","tool":"current_time","use_rag":false,"use_memory":false}
USER: what's my next reminder
OUTPUT: {"action":"reminder_query","tool":"reminder_next","use_rag":false,"use_memory":false}
USER: delete all reminders
OUTPUT: {"action":"reminder_delete","tool":null,"use_rag":false,"use_memory":false,"reminder_index":-999}
USER: remember that my sister lives in Porto
OUTPUT: {"action":"memory_save","tool":null,"use_rag":false,"use_memory":false,"memory_data":{"content":"my sister lives in Porto"}}
USER: where does my sister live?
OUTPUT: {"action":"general","tool":null,"use_rag":false,"use_memory":true}
USER: what did I write about the garden project?
OUTPUT: {"action":"general","tool":null,"use_rag":true,"use_memory":false}"#;

/// Longest slice of raw router output echoed into logs.
const LOG_SNIPPET_CHARS: usize = 200;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("Invalid code fence regex")
    })
}

/// Intent classifier backed by a completion endpoint.
pub struct IntentClassifier {
    completion: Arc<dyn Completion>,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(completion: Arc<dyn Completion>, timeout: Duration) -> Self {
        Self {
            completion,
            timeout,
        }
    }

    /// Prompt sent to the router for `message`.
    pub fn build_prompt(message: &str, last_user_message: Option<&str>) -> String {
        match last_user_message.map(str::trim).filter(|m| !m.is_empty()) {
            Some(previous) => format!("PREVIOUS: {}\nCURRENT: {}\nOUTPUT:", previous, message),
            None => format!("USER: {}\nOUTPUT:", message),
        }
    }

    /// Classify `message`. Never fails; any problem yields [`Intent::fallback`].
    pub async fn classify(&self, message: &str, last_user_message: Option<&str>) -> Intent {
        let prompt = Self::build_prompt(message, last_user_message);

        let raw = match tokio::time::timeout(
            self.timeout,
            self.completion.complete(ROUTER_SYSTEM_PROMPT, &prompt, &[]),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "Intent routing call failed, using fallback");
                return Intent::fallback();
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Intent routing timed out, using fallback"
                );
                return Intent::fallback();
            }
        };

        match parse_intent(&raw) {
            Ok(intent) => {
                debug!(action = intent.action.name(), tool = ?intent.tool, "Intent classified");
                intent
            }
            Err(e) => {
                let snippet: String = raw.chars().take(LOG_SNIPPET_CHARS).collect();
                warn!(error = %e, raw = %snippet, "Unusable router output, using fallback");
                Intent::fallback()
            }
        }
    }
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match fence_regex().captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => trimmed,
    }
}

/// Parse router output into an intent.
///
/// Prose around a single JSON object is tolerated; anything else is an error.
pub fn parse_intent(raw: &str) -> Result<Intent, ChatError> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(ChatError::IntentParse("empty router output".to_string()));
    }
    match serde_json::from_str::<Intent>(body) {
        Ok(intent) => Ok(intent),
        Err(first) => {
            let embedded = match (body.find('{'), body.rfind('}')) {
                (Some(start), Some(end)) if end > start => &body[start..=end],
                _ => return Err(ChatError::IntentParse(first.to_string())),
            };
            serde_json::from_str::<Intent>(embedded)
                .map_err(|e| ChatError::IntentParse(e.to_string()))
        }
    }
}
