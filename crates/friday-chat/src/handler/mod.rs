//! Chat handlers and the registry that routes actions to them.

pub mod alert;
pub mod calendar;
pub mod general;
pub mod health;
pub mod memory;
pub mod note;
pub mod reminder;
pub mod task;
pub mod time;
pub mod web_search;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use friday_action::{TodoStore, TriggerStore};
use tracing::warn;

use crate::collaborators::{
    CalendarProvider, HealthProvider, KnowledgeBase, MemoryStore, NoteStore, WebSearch,
};
use crate::error::HandlerError;
use crate::types::{ChatContext, ChatResponse};

pub use alert::AlertHandler;
pub use calendar::CalendarHandler;
pub use general::GeneralHandler;
pub use health::HealthHandler;
pub use memory::MemoryHandler;
pub use note::NoteHandler;
pub use reminder::ReminderHandler;
pub use task::TaskHandler;
pub use time::TimeHandler;
pub use web_search::WebSearchHandler;

/// A unit that turns a classified request into a response.
#[async_trait]
pub trait ChatHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &ChatContext) -> Result<ChatResponse, HandlerError>;
}

/// Action name to handler lookup with a default for unknown actions.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ChatHandler>>,
    default: Arc<dyn ChatHandler>,
}

impl HandlerRegistry {
    pub fn new(default: Arc<dyn ChatHandler>) -> Self {
        Self {
            handlers: HashMap::new(),
            default,
        }
    }

    /// Bind `handler` to each of `actions`.
    ///
    /// Returns the actions that were already bound; the new handler replaces
    /// the old binding.
    pub fn register(&mut self, handler: Arc<dyn ChatHandler>, actions: &[&str]) -> Vec<String> {
        let mut replaced = Vec::new();
        for action in actions {
            let key = action.trim().to_lowercase();
            if let Some(previous) = self.handlers.insert(key.clone(), handler.clone()) {
                warn!(
                    action = %key,
                    previous = previous.name(),
                    replacement = handler.name(),
                    "Handler registered twice for action"
                );
                replaced.push(key);
            }
        }
        replaced
    }

    /// Handler for `action`, or the default handler.
    pub fn resolve(&self, action: &str) -> Arc<dyn ChatHandler> {
        self.handlers
            .get(action)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn is_registered(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }
}

/// Stores and optional services the built-in handlers work against.
pub struct Services {
    pub triggers: Arc<TriggerStore>,
    pub todos: Arc<TodoStore>,
    pub notes: Arc<dyn NoteStore>,
    pub default_folder: String,
    pub knowledge: Option<Arc<dyn KnowledgeBase>>,
    pub calendar: Option<Arc<dyn CalendarProvider>>,
    pub web: Option<Arc<dyn WebSearch>>,
    pub health: Option<Arc<dyn HealthProvider>>,
    pub memory: Option<Arc<dyn MemoryStore>>,
}

impl HandlerRegistry {
    /// Registry with every built-in handler bound to its actions.
    pub fn with_builtin_handlers(services: Services) -> Self {
        let tz = services.triggers.timezone();
        let general = GeneralHandler::new(services.knowledge).with_memory(services.memory.clone());
        let mut registry = Self::new(Arc::new(general));

        registry.register(Arc::new(TimeHandler::new(tz)), &["time_query"]);
        registry.register(
            Arc::new(ReminderHandler::new(services.triggers.clone())),
            &["reminder_create", "reminder_query", "reminder_delete"],
        );
        registry.register(
            Arc::new(AlertHandler::new(services.triggers)),
            &["alert_create", "alert_list", "alert_delete"],
        );
        registry.register(
            Arc::new(NoteHandler::new(services.notes, services.default_folder)),
            &["note_create"],
        );
        registry.register(
            Arc::new(TaskHandler::new(services.todos, tz)),
            &["task_create", "task_list", "task_complete"],
        );
        registry.register(
            Arc::new(CalendarHandler::new(services.calendar, tz)),
            &["calendar_query"],
        );
        registry.register(Arc::new(WebSearchHandler::new(services.web)), &["web_search"]);
        registry.register(Arc::new(HealthHandler::new(services.health)), &["health_query"]);
        registry.register(
            Arc::new(MemoryHandler::new(services.memory)),
            &["memory_save", "memory_list", "memory_delete"],
        );
        registry
    }
}

/// Local time of `at` as "15:40" today, "tomorrow 09:00" or "Mon 19 Oct 09:00".
pub(crate) fn describe_time(at: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> String {
    let local = at.with_timezone(&tz);
    let today = now.with_timezone(&tz).date_naive();
    let date = local.date_naive();
    if date == today {
        local.format("%H:%M").to_string()
    } else if today.succ_opt() == Some(date) {
        format!("tomorrow {}", local.format("%H:%M"))
    } else {
        local.format("%a %-d %b %H:%M").to_string()
    }
}

/// Renders up to `limit` items as a numbered list.
pub(crate) fn numbered<T>(items: &[T], limit: usize, render: impl Fn(&T) -> String) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, render(item)))
        .collect();
    if items.len() > limit {
        lines.push(format!("...and {} more", items.len() - limit));
    }
    lines.join("\n")
}
