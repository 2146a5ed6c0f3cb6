//! To-do tasks: create, list, complete.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use chrono_tz::Tz;
use friday_action::{NewTodo, Priority, Todo, TodoContext, TodoError, TodoStatus, TodoStore};

use super::{numbered, ChatHandler};
use crate::error::HandlerError;
use crate::intent::{Action, TaskData};
use crate::types::{ChatContext, ChatResponse};

const LIST_LIMIT: usize = 20;

pub struct TaskHandler {
    store: Arc<TodoStore>,
    tz: Tz,
}

/// "today", "tomorrow", a weekday name (next occurrence) or YYYY-MM-DD.
fn parse_due_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let raw = raw.trim().to_lowercase();
    match raw.as_str() {
        "today" | "tonight" => return Some(today),
        "tomorrow" => return today.succ_opt(),
        _ => {}
    }
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Some(date);
    }
    let weekday: Weekday = raw.trim_start_matches("next ").parse().ok()?;
    let mut days = (weekday.num_days_from_monday() as i64)
        - (today.weekday().num_days_from_monday() as i64);
    if days <= 0 {
        days += 7;
    }
    today.checked_add_signed(Duration::days(days))
}

fn priority_icon(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "🔴",
        Priority::High => "🟠",
        Priority::Medium => "🟡",
        Priority::Low => "⚪",
    }
}

fn map_error(operation: &'static str) -> impl Fn(TodoError) -> HandlerError {
    move |err| match err {
        TodoError::Validation(msg) => HandlerError::Validation(msg),
        TodoError::InvalidTransition(from, _) => {
            HandlerError::Validation(format!("That task is already {}.", from))
        }
        other => HandlerError::failed(operation, other),
    }
}

impl TaskHandler {
    pub fn new(store: Arc<TodoStore>, tz: Tz) -> Self {
        Self { store, tz }
    }

    fn create(&self, ctx: &ChatContext, data: Option<&TaskData>) -> Result<ChatResponse, HandlerError> {
        let data = data.ok_or_else(|| HandlerError::validation("What's the task?"))?;
        let title = data
            .title
            .as_deref()
            .ok_or_else(|| HandlerError::validation("What's the task?"))?;

        let today = ctx.now.with_timezone(&self.tz).date_naive();
        let due_date = match data.due_date.as_deref() {
            Some(raw) => Some(parse_due_date(raw, today).ok_or_else(|| {
                HandlerError::validation(format!(
                    "Couldn't understand due date '{}'. Try 'today', 'tomorrow' or YYYY-MM-DD.",
                    raw
                ))
            })?),
            None => None,
        };
        let new = NewTodo {
            title: title.to_string(),
            priority: data
                .priority
                .as_deref()
                .and_then(|p| p.parse().ok())
                .unwrap_or_default(),
            context: data
                .context
                .as_deref()
                .and_then(|c| c.parse().ok())
                .unwrap_or_default(),
            due_date,
        };

        let task = self.store.create(new, ctx.now).map_err(map_error("add task"))?;

        let mut answer = format!("✅ Task added: '{}'", task.title);
        if let Some(due) = task.due_date {
            if due == today {
                answer.push_str(" (due today)");
            } else if Some(due) == today.succ_opt() {
                answer.push_str(" (due tomorrow)");
            } else {
                answer.push_str(&format!(" (due {})", due));
            }
        }
        if task.priority > Priority::Medium {
            answer.push_str(&format!(" [{}]", task.priority));
        }
        if task.context != TodoContext::Any {
            answer.push_str(&format!(" @{}", task.context));
        }
        Ok(ChatResponse::final_answer(answer))
    }

    fn list(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        let today = ctx.now.with_timezone(&self.tz).date_naive();
        let render = |t: &Todo| {
            let due = match t.due_date {
                Some(d) if d < today => format!(" (overdue, {})", d),
                Some(d) if d == today => " (today)".to_string(),
                Some(d) => format!(" (due {})", d),
                None => String::new(),
            };
            format!("{} {}{}", priority_icon(t.priority), t.title, due)
        };

        if ctx.intent.tool() == Some("task_today") {
            let tasks = self.store.due_by(today);
            if tasks.is_empty() {
                return Ok(ChatResponse::final_answer("Nothing due today."));
            }
            return Ok(ChatResponse::final_answer(format!(
                "📋 Due today:\n{}",
                numbered(&tasks, LIST_LIMIT, render)
            )));
        }

        let tasks = self.store.list(Some(TodoStatus::Open), None, None);
        if tasks.is_empty() {
            return Ok(ChatResponse::final_answer("You have no open tasks."));
        }
        Ok(ChatResponse::final_answer(format!(
            "📋 Your open tasks:\n{}",
            numbered(&tasks, LIST_LIMIT, render)
        )))
    }

    fn complete(&self, ctx: &ChatContext, data: Option<&TaskData>) -> Result<ChatResponse, HandlerError> {
        let query = data
            .and_then(|d| d.task_id.as_deref().or(d.title.as_deref()))
            .ok_or_else(|| HandlerError::validation("Which task did you finish?"))?;
        let task = self.store.find_open(query).map_err(map_error("complete task"))?;
        let done = self
            .store
            .complete(task.id, ctx.now)
            .map_err(map_error("complete task"))?;
        Ok(ChatResponse::final_answer(format!("✅ Completed: '{}'", done.title)))
    }
}

#[async_trait]
impl ChatHandler for TaskHandler {
    fn name(&self) -> &'static str {
        "task"
    }

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError> {
        match &ctx.intent.action {
            Action::TaskCreate(data) => self.create(ctx, data.as_ref()),
            Action::TaskComplete(data) => self.complete(ctx, data.as_ref()),
            _ => self.list(ctx),
        }
    }
}
