use async_trait::async_trait;
use chrono_tz::Tz;

use super::ChatHandler;
use crate::error::HandlerError;
use crate::types::{ChatContext, ChatResponse};

/// Answers "what time is it" locally, without a model call.
pub struct TimeHandler {
    tz: Tz,
}

impl TimeHandler {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

#[async_trait]
impl ChatHandler for TimeHandler {
    fn name(&self) -> &'static str {
        "time"
    }

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        let local = ctx.now.with_timezone(&self.tz);
        Ok(ChatResponse::final_answer(format!(
            "It's {} on {} ({}).",
            local.format("%H:%M"),
            local.format("%A, %B %-d, %Y"),
            self.tz.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Action, Intent};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_local_time_answer() {
        let ctx = ChatContext {
            session_id: "s".to_string(),
            message: "what time is it?".to_string(),
            intent: Intent::new(Action::TimeQuery).with_tool("current_time"),
            history: vec![],
            last_user_message: None,
            now: Utc.with_ymd_and_hms(2026, 10, 16, 14, 5, 0).unwrap(),
        };
        let handler = TimeHandler::new(chrono_tz::Europe::Berlin);
        let response = handler.handle(&ctx).await.unwrap();
        assert!(response.is_final);
        assert_eq!(
            response.answer,
            "It's 16:05 on Friday, October 16, 2026 (Europe/Berlin)."
        );
    }
}
