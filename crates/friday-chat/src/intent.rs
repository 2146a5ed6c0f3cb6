//! Structured intents produced by the classifier.
//!
//! The wire form is the flat JSON object the router model emits
//! (`{"action": "...", "tool": ..., "reminder_data": {...}}`). In Rust the
//! action and its payload travel together in [`Action`], so a handler never
//! sees a payload that belongs to a different action.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Index sentinel meaning "the most recent pending reminder".
pub const INDEX_LAST: i64 = -1;
/// Index sentinel meaning "every pending reminder".
pub const INDEX_ALL: i64 = -999;

/// Every action name the router is allowed to emit.
pub const KNOWN_ACTIONS: &[&str] = &[
    "general",
    "web_search",
    "time_query",
    "health_query",
    "calendar_query",
    "reminder_create",
    "reminder_query",
    "reminder_delete",
    "alert_create",
    "alert_list",
    "alert_delete",
    "note_create",
    "task_create",
    "task_list",
    "task_complete",
    "memory_save",
    "memory_list",
    "memory_delete",
];

/// Tool hints the router may attach to an intent.
pub const KNOWN_TOOLS: &[&str] = &[
    "current_time",
    "calendar_today",
    "calendar_tomorrow",
    "calendar_week",
    "calendar_next",
    "reminder_list",
    "reminder_next",
    "task_list",
    "task_today",
    "alert_list",
];

/// Classified request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawIntent", into = "RawIntent")]
pub struct Intent {
    pub action: Action,
    pub tool: Option<String>,
    pub use_rag: bool,
    pub use_memory: bool,
}

impl Intent {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            tool: None,
            use_rag: false,
            use_memory: false,
        }
    }

    /// Intent used whenever classification fails.
    pub fn fallback() -> Self {
        Self {
            action: Action::General,
            tool: None,
            use_rag: true,
            use_memory: true,
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn tool(&self) -> Option<&str> {
        self.tool.as_deref()
    }
}

/// What the user asked for, with the payload that action carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    General,
    WebSearch,
    TimeQuery,
    HealthQuery,
    CalendarQuery(Option<CalendarData>),
    ReminderCreate(Option<ReminderData>),
    ReminderQuery,
    /// 0-based position in the pending list, or [`INDEX_LAST`] / [`INDEX_ALL`].
    ReminderDelete { index: Option<i64> },
    AlertCreate(Option<AlertData>),
    AlertList,
    AlertDelete(Option<AlertData>),
    NoteCreate(Option<NoteData>),
    TaskCreate(Option<TaskData>),
    TaskList,
    TaskComplete(Option<TaskData>),
    MemorySave(Option<MemoryData>),
    MemoryList,
    MemoryDelete(Option<MemoryData>),
    /// An action name outside [`KNOWN_ACTIONS`]; routed to the default handler.
    Other(String),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::General => "general",
            Action::WebSearch => "web_search",
            Action::TimeQuery => "time_query",
            Action::HealthQuery => "health_query",
            Action::CalendarQuery(_) => "calendar_query",
            Action::ReminderCreate(_) => "reminder_create",
            Action::ReminderQuery => "reminder_query",
            Action::ReminderDelete { .. } => "reminder_delete",
            Action::AlertCreate(_) => "alert_create",
            Action::AlertList => "alert_list",
            Action::AlertDelete(_) => "alert_delete",
            Action::NoteCreate(_) => "note_create",
            Action::TaskCreate(_) => "task_create",
            Action::TaskList => "task_list",
            Action::TaskComplete(_) => "task_complete",
            Action::MemorySave(_) => "memory_save",
            Action::MemoryList => "memory_list",
            Action::MemoryDelete(_) => "memory_delete",
            Action::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time_spec: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub folder: Option<String>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub context: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub trigger_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub trigger_condition: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub recurring: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub alert_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryData {
    /// The fact to save, or the search text for a deletion.
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub memory_id: Option<String>,
}

/// Accepts strings, numbers and null; blank strings, booleans and "null"
/// become `None`. Router models are not strict about JSON types.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(s.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts a list of strings or a single comma-separated string.
fn lenient_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let raw: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    Ok(raw
        .into_iter()
        .map(|t| t.trim().trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// Flat wire shape of an intent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawIntent {
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    tool: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    use_rag: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    use_memory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reminder_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reminder_index: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alert_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    calendar_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    memory_data: Option<Value>,
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    })
}

fn payload<T: DeserializeOwned>(action: &str, key: &str, value: Option<Value>) -> Option<T> {
    let value = value.filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(action, key, error = %e, "Ignoring malformed intent payload");
            None
        }
    }
}

fn index(value: Option<Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_value<T: Serialize>(data: &Option<T>) -> Option<Value> {
    data.as_ref().and_then(|d| serde_json::to_value(d).ok())
}

impl TryFrom<RawIntent> for Intent {
    type Error = String;

    fn try_from(raw: RawIntent) -> Result<Self, Self::Error> {
        let name = raw.action.trim().to_lowercase();
        if name.is_empty() {
            return Err("intent has an empty action".to_string());
        }
        let action = match name.as_str() {
            "general" => Action::General,
            "web_search" => Action::WebSearch,
            "time_query" => Action::TimeQuery,
            "health_query" => Action::HealthQuery,
            "calendar_query" => {
                Action::CalendarQuery(payload(&name, "calendar_data", raw.calendar_data))
            }
            "reminder_create" => {
                Action::ReminderCreate(payload(&name, "reminder_data", raw.reminder_data))
            }
            "reminder_query" => Action::ReminderQuery,
            "reminder_delete" => Action::ReminderDelete {
                index: index(raw.reminder_index),
            },
            "alert_create" => Action::AlertCreate(payload(&name, "alert_data", raw.alert_data)),
            "alert_list" => Action::AlertList,
            "alert_delete" => Action::AlertDelete(payload(&name, "alert_data", raw.alert_data)),
            "note_create" => Action::NoteCreate(payload(&name, "note_data", raw.note_data)),
            "task_create" => Action::TaskCreate(payload(&name, "task_data", raw.task_data)),
            "task_list" => Action::TaskList,
            "task_complete" => Action::TaskComplete(payload(&name, "task_data", raw.task_data)),
            "memory_save" => Action::MemorySave(payload(&name, "memory_data", raw.memory_data)),
            "memory_list" => Action::MemoryList,
            "memory_delete" => {
                Action::MemoryDelete(payload(&name, "memory_data", raw.memory_data))
            }
            _ => Action::Other(name.clone()),
        };
        Ok(Intent {
            action,
            tool: raw.tool.map(|t| t.to_lowercase()),
            use_rag: raw.use_rag,
            use_memory: raw.use_memory,
        })
    }
}

impl From<Intent> for RawIntent {
    fn from(intent: Intent) -> Self {
        let mut raw = RawIntent {
            action: intent.action.name().to_string(),
            tool: intent.tool,
            use_rag: intent.use_rag,
            use_memory: intent.use_memory,
            ..Default::default()
        };
        match &intent.action {
            Action::CalendarQuery(d) => raw.calendar_data = to_value(d),
            Action::ReminderCreate(d) => raw.reminder_data = to_value(d),
            Action::ReminderDelete { index } => raw.reminder_index = index.map(Value::from),
            Action::AlertCreate(d) | Action::AlertDelete(d) => raw.alert_data = to_value(d),
            Action::NoteCreate(d) => raw.note_data = to_value(d),
            Action::TaskCreate(d) | Action::TaskComplete(d) => raw.task_data = to_value(d),
            Action::MemorySave(d) | Action::MemoryDelete(d) => raw.memory_data = to_value(d),
            _ => {}
        }
        raw
    }
}
