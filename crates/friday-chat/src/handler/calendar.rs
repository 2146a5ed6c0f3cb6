//! Calendar lookups through an optional [`CalendarProvider`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use friday_action::time_spec::localize;

use super::ChatHandler;
use crate::collaborators::{CalendarEvent, CalendarProvider};
use crate::error::HandlerError;
use crate::intent::{Action, CalendarData};
use crate::types::{ChatContext, ChatResponse};

const NEXT_EVENT_HORIZON_DAYS: i64 = 14;

pub struct CalendarHandler {
    provider: Option<Arc<dyn CalendarProvider>>,
    tz: Tz,
}

/// The window a query asks about, in local days.
#[derive(Debug, Clone, PartialEq)]
enum Window {
    Day(NaiveDate),
    Week(NaiveDate),
    Next,
}

impl CalendarHandler {
    pub fn new(provider: Option<Arc<dyn CalendarProvider>>, tz: Tz) -> Self {
        Self { provider, tz }
    }

    fn window(&self, ctx: &ChatContext, data: Option<&CalendarData>) -> Window {
        let today = ctx.now.with_timezone(&self.tz).date_naive();
        match ctx.intent.tool() {
            Some("calendar_tomorrow") => return Window::Day(today + Duration::days(1)),
            Some("calendar_week") => return Window::Week(today),
            Some("calendar_next") => return Window::Next,
            Some("calendar_today") => return Window::Day(today),
            _ => {}
        }
        let date = data
            .and_then(|d| d.date.as_deref())
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or(today);
        match data.and_then(|d| d.range.as_deref()) {
            Some("week") => Window::Week(date),
            _ => Window::Day(date),
        }
    }

    fn start_of(&self, date: NaiveDate) -> Result<DateTime<Utc>, HandlerError> {
        localize(&self.tz, date.and_time(NaiveTime::MIN))
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| HandlerError::failed("read calendar", e))
    }

    fn render(&self, event: &CalendarEvent, with_date: bool) -> String {
        let start = event.start.with_timezone(&self.tz);
        let end = event.end.with_timezone(&self.tz);
        let mut line = String::from("- ");
        if with_date {
            line.push_str(&format!("{} ", start.format("%a %-d %b")));
        }
        if event.all_day {
            line.push_str("all day");
        } else {
            line.push_str(&format!("{}-{}", start.format("%H:%M"), end.format("%H:%M")));
        }
        line.push_str(&format!(" {}", event.title));
        if let Some(location) = &event.location {
            line.push_str(&format!(" ({})", location));
        }
        line
    }
}

#[async_trait]
impl ChatHandler for CalendarHandler {
    fn name(&self) -> &'static str {
        "calendar"
    }

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        let provider = match &self.provider {
            Some(p) => p,
            None => return Ok(ChatResponse::final_answer("Calendar is not connected.")),
        };
        let data = match &ctx.intent.action {
            Action::CalendarQuery(data) => data.as_ref(),
            _ => None,
        };

        let window = self.window(ctx, data);
        let (start, end, label, with_date) = match &window {
            Window::Day(date) => {
                let today = ctx.now.with_timezone(&self.tz).date_naive();
                let label = if *date == today {
                    "Today".to_string()
                } else if *date == today + Duration::days(1) {
                    "Tomorrow".to_string()
                } else {
                    date.format("%A %-d %B").to_string()
                };
                (self.start_of(*date)?, self.start_of(*date + Duration::days(1))?, label, false)
            }
            Window::Week(date) => (
                self.start_of(*date)?,
                self.start_of(*date + Duration::days(7))?,
                "Next 7 days".to_string(),
                true,
            ),
            Window::Next => (
                ctx.now,
                ctx.now + Duration::days(NEXT_EVENT_HORIZON_DAYS),
                "Next".to_string(),
                true,
            ),
        };

        let mut events = provider
            .events(start, end)
            .await
            .map_err(|e| HandlerError::failed("read calendar", e))?;
        events.sort_by_key(|e| e.start);

        if window == Window::Next {
            events.retain(|e| e.start >= ctx.now);
            return Ok(ChatResponse::final_answer(match events.first() {
                Some(next) => format!("📅 Next: {}", self.render(next, true).trim_start_matches("- ")),
                None => format!(
                    "Nothing on your calendar in the next {} days.",
                    NEXT_EVENT_HORIZON_DAYS
                ),
            }));
        }

        if events.is_empty() {
            return Ok(ChatResponse::final_answer(format!(
                "📅 {}: nothing scheduled.",
                label
            )));
        }
        let lines: Vec<String> = events.iter().map(|e| self.render(e, with_date)).collect();
        Ok(ChatResponse::final_answer(format!(
            "📅 {}:\n{}",
            label,
            lines.join("\n")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::intent::Intent;
    use crate::testing::{context, friday_afternoon};
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct FakeCalendar {
        events: Vec<CalendarEvent>,
        asked: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    }

    #[async_trait]
    impl CalendarProvider for FakeCalendar {
        async fn events(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<CalendarEvent>, ServiceError> {
            self.asked.lock().unwrap().push((start, end));
            Ok(self
                .events
                .iter()
                .filter(|e| e.end > start && e.start < end)
                .cloned()
                .collect())
        }
    }

    fn event(title: &str, day: u32, hour: u32) -> CalendarEvent {
        let start = Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap();
        CalendarEvent {
            title: title.to_string(),
            start,
            end: start + Duration::hours(1),
            all_day: false,
            location: None,
        }
    }

    fn calendar(events: Vec<CalendarEvent>) -> Arc<FakeCalendar> {
        Arc::new(FakeCalendar {
            events,
            asked: Mutex::new(vec![]),
        })
    }

    async fn ask(handler: &CalendarHandler, tool: &str) -> String {
        let intent = Intent::new(Action::CalendarQuery(None)).with_tool(tool);
        handler
            .handle(&context("msg", intent, friday_afternoon()))
            .await
            .unwrap()
            .answer
    }

    #[tokio::test]
    async fn test_not_connected() {
        let handler = CalendarHandler::new(None, chrono_tz::UTC);
        assert_eq!(ask(&handler, "calendar_today").await, "Calendar is not connected.");
    }

    #[tokio::test]
    async fn test_today_and_tomorrow() {
        let mut standup = event("Standup", 16, 9);
        standup.location = Some("Room 4".to_string());
        let cal = calendar(vec![event("Review", 16, 15), standup, event("Brunch", 17, 11)]);
        let handler = CalendarHandler::new(Some(cal.clone()), chrono_tz::UTC);

        assert_eq!(
            ask(&handler, "calendar_today").await,
            "📅 Today:\n- 09:00-10:00 Standup (Room 4)\n- 15:00-16:00 Review"
        );
        assert_eq!(
            ask(&handler, "calendar_tomorrow").await,
            "📅 Tomorrow:\n- 11:00-12:00 Brunch"
        );
        let asked = cal.asked.lock().unwrap();
        assert_eq!(asked[0].0, Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap());
        assert_eq!(asked[0].1, Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_next_skips_started_events() {
        let cal = calendar(vec![event("Earlier", 16, 9), event("Dinner", 16, 19)]);
        let handler = CalendarHandler::new(Some(cal), chrono_tz::UTC);
        assert_eq!(
            ask(&handler, "calendar_next").await,
            "📅 Next: Fri 16 Oct 19:00-20:00 Dinner"
        );
    }

    #[tokio::test]
    async fn test_explicit_date_with_nothing_scheduled() {
        let handler = CalendarHandler::new(Some(calendar(vec![])), chrono_tz::UTC);
        let intent = Intent::new(Action::CalendarQuery(Some(CalendarData {
            date: Some("2026-10-20".to_string()),
            range: None,
        })));
        let response = handler
            .handle(&context("msg", intent, friday_afternoon()))
            .await
            .unwrap();
        assert_eq!(response.answer, "📅 Tuesday 20 October: nothing scheduled.");
    }
}
