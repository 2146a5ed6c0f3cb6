//! Reminder create / list / delete.

use std::sync::Arc;

use async_trait::async_trait;
use friday_action::{NewTrigger, Trigger, TriggerError, TriggerKind, TriggerSpec, TriggerStore};

use super::{describe_time, numbered, ChatHandler};
use crate::error::HandlerError;
use crate::intent::{Action, ReminderData, INDEX_ALL, INDEX_LAST};
use crate::types::{ChatContext, ChatResponse};

const LIST_LIMIT: usize = 20;
const MINUTES_PER_DAY: i64 = 24 * 60;

pub struct ReminderHandler {
    store: Arc<TriggerStore>,
}

impl ReminderHandler {
    pub fn new(store: Arc<TriggerStore>) -> Self {
        Self { store }
    }

    async fn create(
        &self,
        ctx: &ChatContext,
        data: Option<&ReminderData>,
    ) -> Result<ChatResponse, HandlerError> {
        let message = data
            .and_then(|d| d.message.as_deref())
            .ok_or_else(|| HandlerError::validation("What should I remind you about?"))?;
        let spec_text = data.and_then(|d| d.time_spec.as_deref()).ok_or_else(|| {
            HandlerError::validation(
                "When should I remind you? Try: 'in 30 minutes', 'at 3pm', or 'at 15:40'",
            )
        })?;

        let spec = TriggerSpec::parse(spec_text).map_err(user_error("set reminder"))?;
        let trigger = self
            .store
            .create(NewTrigger::reminder(message, spec), ctx.now)
            .await
            .map_err(user_error("set reminder"))?;

        let minutes = (trigger.remind_at - ctx.now).num_minutes();
        let until = if minutes < MINUTES_PER_DAY {
            format!("{} minutes from now", minutes)
        } else {
            format!("in {} days", minutes / MINUTES_PER_DAY)
        };
        Ok(ChatResponse::final_answer(format!(
            "✅ Reminder set: '{}' at {} ({})",
            trigger.message,
            describe_time(trigger.remind_at, ctx.now, self.store.timezone()),
            until
        )))
    }

    async fn query(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        let pending = self.store.pending(TriggerKind::Reminder).await;
        if pending.is_empty() {
            return Ok(ChatResponse::final_answer("You have no pending reminders."));
        }
        let tz = self.store.timezone();

        if ctx.intent.tool() == Some("reminder_next") {
            let next = &pending[0];
            let minutes = (next.remind_at - ctx.now).num_minutes().max(0);
            return Ok(ChatResponse::final_answer(format!(
                "⏰ Next reminder: '{}' at {} (in {} minutes)",
                next.message,
                describe_time(next.remind_at, ctx.now, tz),
                minutes
            )));
        }

        let list = numbered(&pending, LIST_LIMIT, |t| {
            format!("{} (at {})", t.message, describe_time(t.remind_at, ctx.now, tz))
        });
        Ok(ChatResponse::final_answer(format!(
            "⏰ Your pending reminders:\n{}",
            list
        )))
    }

    async fn delete(
        &self,
        ctx: &ChatContext,
        index: Option<i64>,
    ) -> Result<ChatResponse, HandlerError> {
        let index = index.ok_or_else(|| {
            HandlerError::validation(
                "Which reminder? Say 'delete reminder 2' or 'delete all reminders'.",
            )
        })?;

        if index == INDEX_ALL {
            let cancelled = self
                .store
                .cancel_all(TriggerKind::Reminder, ctx.now)
                .await
                .map_err(user_error("delete reminders"))?;
            if cancelled.is_empty() {
                return Ok(ChatResponse::final_answer("You have no pending reminders."));
            }
            return Ok(ChatResponse::final_answer(format!(
                "🗑️ Deleted all {} reminder(s)",
                cancelled.len()
            )));
        }

        let pending = self.store.pending(TriggerKind::Reminder).await;
        if pending.is_empty() {
            return Ok(ChatResponse::final_answer("You have no pending reminders."));
        }
        if index < 0 && index != INDEX_LAST {
            return Err(HandlerError::validation(format!(
                "'{}' is not a reminder number. Say 'delete reminder 2' or 'delete the last reminder'.",
                index
            )));
        }
        let target = select(&pending, index).ok_or_else(|| {
            HandlerError::validation(format!(
                "There is no reminder #{}. You have {} pending.",
                index.saturating_add(1),
                pending.len()
            ))
        })?;

        let cancelled = self
            .store
            .cancel(target.id, ctx.now)
            .await
            .map_err(user_error("delete reminder"))?;
        Ok(ChatResponse::final_answer(format!(
            "🗑️ Deleted reminder: '{}'",
            cancelled.message
        )))
    }
}

fn select(pending: &[Trigger], index: i64) -> Option<&Trigger> {
    if index == INDEX_LAST {
        return pending.last();
    }
    usize::try_from(index).ok().and_then(|i| pending.get(i))
}

/// Trigger errors the user can act on become validation messages.
pub(crate) fn user_error(operation: &'static str) -> impl Fn(TriggerError) -> HandlerError {
    move |err| match err {
        TriggerError::InvalidSpec(msg) | TriggerError::Validation(msg) => {
            HandlerError::Validation(msg)
        }
        TriggerError::InvalidTransition { from, .. } => {
            HandlerError::Validation(format!("That one is already {}.", from))
        }
        other => HandlerError::failed(operation, other),
    }
}

#[async_trait]
impl ChatHandler for ReminderHandler {
    fn name(&self) -> &'static str {
        "reminder"
    }

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        match &ctx.intent.action {
            Action::ReminderCreate(data) => self.create(ctx, data.as_ref()).await,
            Action::ReminderDelete { index } => self.delete(ctx, *index).await,
            _ => self.query(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Intent;
    use crate::testing::{context, friday_afternoon};
    use chrono::Duration;
    use friday_action::TriggerStatus;
    use friday_core::config::TriggerConfig;

    fn handler() -> (ReminderHandler, Arc<TriggerStore>) {
        let store = Arc::new(TriggerStore::in_memory(
            TriggerConfig::default(),
            chrono_tz::UTC,
        ));
        (ReminderHandler::new(store.clone()), store)
    }

    fn create_intent(message: Option<&str>, spec: Option<&str>) -> Intent {
        Intent::new(Action::ReminderCreate(Some(ReminderData {
            message: message.map(String::from),
            time_spec: spec.map(String::from),
        })))
    }

    async fn run(handler: &ReminderHandler, intent: Intent) -> Result<ChatResponse, HandlerError> {
        handler
            .handle(&context("msg", intent, friday_afternoon()))
            .await
    }

    async fn seed(store: &TriggerStore, message: &str, minutes: i64) -> Trigger {
        store
            .create(
                NewTrigger::reminder(message, TriggerSpec::Relative { minutes }),
                friday_afternoon(),
            )
            .await
            .unwrap()
    }

    // =====================================================================
    // Create
    // =====================================================================

    #[tokio::test]
    async fn test_create_relative() {
        let (handler, store) = handler();
        let response = run(&handler, create_intent(Some("call mom"), Some("in 30 minutes")))
            .await
            .unwrap();
        assert!(response.is_final);
        assert_eq!(
            response.answer,
            "✅ Reminder set: 'call mom' at 14:30 (30 minutes from now)"
        );

        let pending = store.pending(TriggerKind::Reminder).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].remind_at, friday_afternoon() + Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_create_clock_time() {
        let (handler, _store) = handler();
        let response = run(&handler, create_intent(Some("stand up"), Some("at 15:40")))
            .await
            .unwrap();
        assert_eq!(
            response.answer,
            "✅ Reminder set: 'stand up' at 15:40 (100 minutes from now)"
        );
    }

    #[tokio::test]
    async fn test_create_unparseable_time() {
        let (handler, store) = handler();
        let err = run(&handler, create_intent(Some("x"), Some("whenever")))
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "❌ Couldn't parse time 'whenever'. Try: 'in 30 minutes', 'at 3pm', or 'at 15:40'"
        );
        assert!(store.pending(TriggerKind::Reminder).await.is_empty());
    }

    #[tokio::test]
    async fn test_create_missing_fields() {
        let (handler, _store) = handler();
        let err = run(&handler, Intent::new(Action::ReminderCreate(None)))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));

        let err = run(&handler, create_intent(Some("x"), None)).await.unwrap_err();
        assert!(err.to_string().starts_with("When should I remind you?"));
    }

    // =====================================================================
    // Query
    // =====================================================================

    #[tokio::test]
    async fn test_query_empty() {
        let (handler, _store) = handler();
        let response = run(&handler, Intent::new(Action::ReminderQuery)).await.unwrap();
        assert_eq!(response.answer, "You have no pending reminders.");
    }

    #[tokio::test]
    async fn test_query_lists_soonest_first() {
        let (handler, store) = handler();
        seed(&store, "later", 90).await;
        seed(&store, "sooner", 10).await;

        let response = run(&handler, Intent::new(Action::ReminderQuery)).await.unwrap();
        assert_eq!(
            response.answer,
            "⏰ Your pending reminders:\n1. sooner (at 14:10)\n2. later (at 15:30)"
        );

        let next = run(
            &handler,
            Intent::new(Action::ReminderQuery).with_tool("reminder_next"),
        )
        .await
        .unwrap();
        assert_eq!(
            next.answer,
            "⏰ Next reminder: 'sooner' at 14:10 (in 10 minutes)"
        );
    }

    // =====================================================================
    // Delete
    // =====================================================================

    #[tokio::test]
    async fn test_delete_by_index_and_last() {
        let (handler, store) = handler();
        seed(&store, "first", 10).await;
        seed(&store, "second", 20).await;
        seed(&store, "third", 30).await;

        let response = run(&handler, Intent::new(Action::ReminderDelete { index: Some(1) }))
            .await
            .unwrap();
        assert_eq!(response.answer, "🗑️ Deleted reminder: 'second'");

        let response = run(
            &handler,
            Intent::new(Action::ReminderDelete {
                index: Some(INDEX_LAST),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.answer, "🗑️ Deleted reminder: 'third'");

        let remaining = store.pending(TriggerKind::Reminder).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "first");
    }

    #[tokio::test]
    async fn test_delete_all() {
        let (handler, store) = handler();
        seed(&store, "a", 10).await;
        seed(&store, "b", 20).await;

        let response = run(
            &handler,
            Intent::new(Action::ReminderDelete {
                index: Some(INDEX_ALL),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.answer, "🗑️ Deleted all 2 reminder(s)");

        let all = store.list(Default::default()).await;
        assert!(all.iter().all(|t| t.status == TriggerStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_delete_out_of_range() {
        let (handler, store) = handler();
        seed(&store, "only", 10).await;

        let err = run(&handler, Intent::new(Action::ReminderDelete { index: Some(4) }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "There is no reminder #5. You have 1 pending.");
        assert_eq!(store.pending(TriggerKind::Reminder).await.len(), 1);

        let err = run(&handler, Intent::new(Action::ReminderDelete { index: None }))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_rejects_extreme_and_negative_indexes() {
        let (handler, store) = handler();
        seed(&store, "only", 10).await;

        let err = run(&handler, Intent::new(Action::ReminderDelete { index: Some(i64::MAX) }))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("There is no reminder #{}. You have 1 pending.", i64::MAX)
        );

        for index in [-2, -5, i64::MIN] {
            let err = run(&handler, Intent::new(Action::ReminderDelete { index: Some(index) }))
                .await
                .unwrap_err();
            assert!(matches!(err, HandlerError::Validation(_)));
            assert!(err.to_string().contains("is not a reminder number"), "{}", err);
        }
        assert_eq!(store.pending(TriggerKind::Reminder).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_with_nothing_pending() {
        let (handler, _store) = handler();
        let response = run(&handler, Intent::new(Action::ReminderDelete { index: Some(0) }))
            .await
            .unwrap();
        assert_eq!(response.answer, "You have no pending reminders.");
    }
}
