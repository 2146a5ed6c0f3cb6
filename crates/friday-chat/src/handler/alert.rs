//! Alerts: titled triggers with priority, optional recurrence, or a condition.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use friday_action::{
    NewTrigger, Priority, RecurringPattern, Trigger, TriggerKind, TriggerSpec, TriggerStore,
};

use super::reminder::user_error;
use super::{describe_time, numbered, ChatHandler};
use crate::error::HandlerError;
use crate::intent::{Action, AlertData};
use crate::types::{ChatContext, ChatResponse};

const LIST_LIMIT: usize = 20;

pub struct AlertHandler {
    store: Arc<TriggerStore>,
}

fn when(alert: &Trigger, now: DateTime<Utc>, tz: Tz) -> String {
    match &alert.condition {
        Some(condition) => format!("when {}", condition),
        None => {
            let at = describe_time(alert.remind_at, now, tz);
            match alert.recurring_pattern {
                Some(pattern) => format!("{}, repeats {}", at, pattern),
                None => at,
            }
        }
    }
}

impl AlertHandler {
    pub fn new(store: Arc<TriggerStore>) -> Self {
        Self { store }
    }

    async fn create(
        &self,
        ctx: &ChatContext,
        data: Option<&AlertData>,
    ) -> Result<ChatResponse, HandlerError> {
        let data = data.ok_or_else(|| HandlerError::validation("What should the alert be about?"))?;
        let title = data
            .title
            .as_deref()
            .ok_or_else(|| HandlerError::validation("An alert needs a title."))?;

        let mut description = data.description.clone();
        let spec = match (&data.trigger_date, &data.trigger_condition) {
            (Some(date), condition) => {
                if let Some(condition) = condition {
                    description = Some(match description {
                        Some(d) => format!("{} (when {})", d, condition),
                        None => format!("When {}", condition),
                    });
                }
                TriggerSpec::parse(date).map_err(user_error("set alert"))?
            }
            (None, Some(condition)) => TriggerSpec::Condition(condition.clone()),
            (None, None) => {
                return Err(HandlerError::validation(
                    "When should I alert you? Give a date like 'friday' or '2026-11-02', or a condition.",
                ))
            }
        };

        let recurring = match data.recurring.as_deref() {
            Some(raw) => Some(raw.parse::<RecurringPattern>().map_err(|_| {
                HandlerError::validation(format!(
                    "Unknown recurrence '{}'. Use daily, weekly or monthly.",
                    raw
                ))
            })?),
            None => None,
        };
        if recurring.is_some() && spec.is_condition() {
            return Err(HandlerError::validation(
                "Condition alerts cannot repeat on a schedule.",
            ));
        }
        let priority = data
            .priority
            .as_deref()
            .and_then(|p| p.parse::<Priority>().ok())
            .unwrap_or_default();

        let tz = self.store.timezone();
        if let Some(existing) = self.store.find_similar(TriggerKind::Alert, title).await {
            return Err(HandlerError::validation(format!(
                "You already have a similar alert: '{}' ({})",
                existing.message,
                when(&existing, ctx.now, tz)
            )));
        }

        let alert = self
            .store
            .create(
                NewTrigger::alert(title, spec)
                    .with_description(description)
                    .with_recurring(recurring)
                    .with_priority(priority),
                ctx.now,
            )
            .await
            .map_err(user_error("set alert"))?;

        Ok(ChatResponse::final_answer(format!(
            "✅ Alert set: '{}' ({})",
            alert.message,
            when(&alert, ctx.now, tz)
        )))
    }

    async fn list(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        let alerts = self.store.pending(TriggerKind::Alert).await;
        if alerts.is_empty() {
            return Ok(ChatResponse::final_answer("You have no active alerts."));
        }
        let tz = self.store.timezone();
        let list = numbered(&alerts, LIST_LIMIT, |a| {
            let flag = match a.priority {
                Priority::Urgent | Priority::High => "❗ ",
                _ => "",
            };
            format!("{}{}, {} [{}]", flag, a.message, when(a, ctx.now, tz), a.short_id())
        });
        Ok(ChatResponse::final_answer(format!(
            "🔔 Your active alerts:\n{}",
            list
        )))
    }

    async fn delete(
        &self,
        ctx: &ChatContext,
        data: Option<&AlertData>,
    ) -> Result<ChatResponse, HandlerError> {
        let alerts = self.store.pending(TriggerKind::Alert).await;
        let target = match data.and_then(|d| d.alert_id.as_deref()) {
            Some(id) => {
                let id = id.to_lowercase();
                alerts
                    .iter()
                    .find(|a| a.id.to_string().starts_with(&id))
                    .ok_or_else(|| {
                        HandlerError::validation(format!("No active alert has id '{}'.", id))
                    })?
            }
            None => {
                let query = data.and_then(|d| d.title.as_deref()).ok_or_else(|| {
                    HandlerError::validation("Which alert? Give its title or id.")
                })?;
                find_by_title(&alerts, query)?
            }
        };

        let cancelled = self
            .store
            .cancel(target.id, ctx.now)
            .await
            .map_err(user_error("delete alert"))?;
        Ok(ChatResponse::final_answer(format!(
            "🗑️ Deleted alert: '{}'",
            cancelled.message
        )))
    }
}

fn find_by_title<'a>(alerts: &'a [Trigger], query: &str) -> Result<&'a Trigger, HandlerError> {
    let needle = query.trim().to_lowercase();
    if let Some(exact) = alerts.iter().find(|a| a.message.to_lowercase() == needle) {
        return Ok(exact);
    }
    let matches: Vec<&Trigger> = alerts
        .iter()
        .filter(|a| a.message.to_lowercase().contains(&needle))
        .collect();
    match matches.as_slice() {
        [] => Err(HandlerError::validation(format!(
            "No active alert matches '{}'.",
            query.trim()
        ))),
        [one] => Ok(*one),
        many => Err(HandlerError::validation(format!(
            "{} alerts match '{}': {}. Which one?",
            many.len(),
            query.trim(),
            many.iter()
                .map(|a| format!("'{}' [{}]", a.message, a.short_id()))
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

#[async_trait]
impl ChatHandler for AlertHandler {
    fn name(&self) -> &'static str {
        "alert"
    }

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        match &ctx.intent.action {
            Action::AlertCreate(data) => self.create(ctx, data.as_ref()).await,
            Action::AlertDelete(data) => self.delete(ctx, data.as_ref()).await,
            _ => self.list(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Intent;
    use crate::testing::{context, friday_afternoon};
    use chrono::TimeZone;
    use friday_core::config::TriggerConfig;

    fn handler() -> (AlertHandler, Arc<TriggerStore>) {
        let store = Arc::new(TriggerStore::in_memory(
            TriggerConfig::default(),
            chrono_tz::UTC,
        ));
        (AlertHandler::new(store.clone()), store)
    }

    async fn run(handler: &AlertHandler, action: Action) -> Result<ChatResponse, HandlerError> {
        handler
            .handle(&context("msg", Intent::new(action), friday_afternoon()))
            .await
    }

    fn data(title: &str, date: Option<&str>) -> AlertData {
        AlertData {
            title: Some(title.to_string()),
            trigger_date: date.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_weekday_alert() {
        let (handler, store) = handler();
        let mut d = data("Put the bins out", Some("monday"));
        d.recurring = Some("weekly".to_string());
        d.priority = Some("high".to_string());

        let response = run(&handler, Action::AlertCreate(Some(d))).await.unwrap();
        assert_eq!(
            response.answer,
            "✅ Alert set: 'Put the bins out' (Mon 19 Oct 09:00, repeats weekly)"
        );

        let alerts = store.pending(TriggerKind::Alert).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(
            alerts[0].remind_at,
            Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
        );
        assert_eq!(alerts[0].priority, Priority::High);
        assert_eq!(alerts[0].recurring_pattern, Some(RecurringPattern::Weekly));
    }

    #[tokio::test]
    async fn test_create_condition_alert() {
        let (handler, store) = handler();
        let d = AlertData {
            title: Some("Take umbrella".to_string()),
            trigger_condition: Some("it rains".to_string()),
            ..Default::default()
        };
        let response = run(&handler, Action::AlertCreate(Some(d))).await.unwrap();
        assert_eq!(response.answer, "✅ Alert set: 'Take umbrella' (when it rains)");

        let alert = &store.pending(TriggerKind::Alert).await[0];
        assert_eq!(alert.condition.as_deref(), Some("it rains"));
        assert!(!alert.is_due(friday_afternoon() + chrono::Duration::days(30)));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let (handler, store) = handler();
        run(&handler, Action::AlertCreate(Some(data("Dentist appointment Tuesday", Some("tuesday")))))
            .await
            .unwrap();

        let err = run(
            &handler,
            Action::AlertCreate(Some(data("dentist appointment tuesday", Some("2026-10-27")))),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("You already have a similar alert"));
        assert_eq!(store.pending(TriggerKind::Alert).await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (handler, _store) = handler();
        let err = run(&handler, Action::AlertCreate(Some(data("No date", None))))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("When should I alert you?"));

        let mut d = data("Bad recurrence", Some("friday"));
        d.recurring = Some("fortnightly".to_string());
        let err = run(&handler, Action::AlertCreate(Some(d))).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown recurrence 'fortnightly'. Use daily, weekly or monthly."
        );

        let err = run(&handler, Action::AlertCreate(Some(data("Past", Some("2020-01-01")))))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_and_delete_by_title() {
        let (handler, store) = handler();
        run(&handler, Action::AlertCreate(Some(data("Pay rent", Some("2026-11-01")))))
            .await
            .unwrap();
        run(&handler, Action::AlertCreate(Some(data("Renew passport", Some("2026-12-01")))))
            .await
            .unwrap();

        let listing = run(&handler, Action::AlertList).await.unwrap();
        assert!(listing.answer.starts_with("🔔 Your active alerts:\n1. Pay rent, Sun 1 Nov 09:00 ["));
        assert!(listing.answer.contains("\n2. Renew passport"));

        let response = run(&handler, Action::AlertDelete(Some(data("rent", None))))
            .await
            .unwrap();
        assert_eq!(response.answer, "🗑️ Deleted alert: 'Pay rent'");
        assert_eq!(store.pending(TriggerKind::Alert).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_id_and_ambiguity() {
        let (handler, store) = handler();
        run(&handler, Action::AlertCreate(Some(data("Call the bank", Some("friday")))))
            .await
            .unwrap();
        run(&handler, Action::AlertCreate(Some(data("Call plumber", Some("2026-11-03")))))
            .await
            .unwrap();

        let err = run(&handler, Action::AlertDelete(Some(data("call", None))))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("2 alerts match 'call'"));

        let plumber = store
            .pending(TriggerKind::Alert)
            .await
            .into_iter()
            .find(|a| a.message == "Call plumber")
            .unwrap();
        let by_id = AlertData {
            alert_id: Some(plumber.short_id()),
            ..Default::default()
        };
        let response = run(&handler, Action::AlertDelete(Some(by_id))).await.unwrap();
        assert_eq!(response.answer, "🗑️ Deleted alert: 'Call plumber'");
    }

    #[tokio::test]
    async fn test_list_empty() {
        let (handler, _store) = handler();
        let response = run(&handler, Action::AlertList).await.unwrap();
        assert_eq!(response.answer, "You have no active alerts.");
    }
}
