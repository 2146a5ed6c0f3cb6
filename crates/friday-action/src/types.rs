//! Core domain types for reminders, alerts and to-do tasks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::time_spec::TriggerSpec;

/// Lifecycle status of a trigger.
///
/// `Pending` is the only non-terminal state; see `trigger::state_machine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Pending,
    Sent,
    Cancelled,
}

impl TriggerStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TriggerStatus::Pending)
    }
}

impl fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerStatus::Pending => write!(f, "pending"),
            TriggerStatus::Sent => write!(f, "sent"),
            TriggerStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TriggerStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TriggerStatus::Pending),
            "sent" => Ok(TriggerStatus::Sent),
            "cancelled" => Ok(TriggerStatus::Cancelled),
            _ => Err(format!("Unknown trigger status: {}", s)),
        }
    }
}

/// Reminders are plain timed messages; alerts carry a title, priority and
/// optional recurrence or condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    #[default]
    Reminder,
    Alert,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Reminder => write!(f, "reminder"),
            TriggerKind::Alert => write!(f, "alert"),
        }
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reminder" => Ok(TriggerKind::Reminder),
            "alert" => Ok(TriggerKind::Alert),
            _ => Err(format!("Unknown trigger kind: {}", s)),
        }
    }
}

/// Ordered from least to most pressing.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "normal" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("Unknown priority: {}", other)),
        }
    }
}

/// Repetition rule for a recurring trigger. The weekday of a weekly trigger is
/// carried by its `remind_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecurringPattern {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for RecurringPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurringPattern::Daily => write!(f, "daily"),
            RecurringPattern::Weekly => write!(f, "weekly"),
            RecurringPattern::Monthly => write!(f, "monthly"),
        }
    }
}

impl std::str::FromStr for RecurringPattern {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "every day" => Ok(RecurringPattern::Daily),
            "weekly" | "every week" => Ok(RecurringPattern::Weekly),
            "monthly" | "every month" => Ok(RecurringPattern::Monthly),
            other => Err(format!("Unknown recurring pattern: {}", other)),
        }
    }
}

impl Serialize for RecurringPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecurringPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A persisted reminder or alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: Uuid,
    #[serde(default)]
    pub kind: TriggerKind,
    #[serde(alias = "title")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub remind_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: TriggerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_pattern: Option<RecurringPattern>,
    /// Free-text condition; evaluated elsewhere, never fired by the scheduler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivery_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Start of the current run of failed deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_failed_at: Option<DateTime<Utc>>,
    /// Id of the sent occurrence this entry was re-armed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_id: Option<Uuid>,
}

impl Trigger {
    pub fn is_pending(&self) -> bool {
        self.status == TriggerStatus::Pending
    }

    /// Whether the scheduler should attempt delivery at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.condition.is_none() && self.remind_at <= now
    }

    /// Short id prefix used in user-facing listings.
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}

/// Request to create a trigger.
#[derive(Debug, Clone)]
pub struct NewTrigger {
    pub kind: TriggerKind,
    pub message: String,
    pub description: Option<String>,
    pub spec: TriggerSpec,
    pub recurring: Option<RecurringPattern>,
    pub priority: Priority,
}

impl NewTrigger {
    /// A one-shot reminder.
    pub fn reminder(message: impl Into<String>, spec: TriggerSpec) -> Self {
        Self {
            kind: TriggerKind::Reminder,
            message: message.into(),
            description: None,
            spec,
            recurring: None,
            priority: Priority::Medium,
        }
    }

    /// An alert; adjust description, recurrence and priority with the builders.
    pub fn alert(title: impl Into<String>, spec: TriggerSpec) -> Self {
        Self {
            kind: TriggerKind::Alert,
            ..Self::reminder(title, spec)
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_recurring(mut self, recurring: Option<RecurringPattern>) -> Self {
        self.recurring = recurring;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Listing filter; `None` fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerFilter {
    pub status: Option<TriggerStatus>,
    pub kind: Option<TriggerKind>,
}

impl TriggerFilter {
    pub fn pending(kind: TriggerKind) -> Self {
        Self {
            status: Some(TriggerStatus::Pending),
            kind: Some(kind),
        }
    }

    pub fn matches(&self, trigger: &Trigger) -> bool {
        self.status.map_or(true, |s| trigger.status == s)
            && self.kind.map_or(true, |k| trigger.kind == k)
    }
}

/// Lifecycle status of a to-do task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Open,
    Done,
    Cancelled,
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoStatus::Open => write!(f, "open"),
            TodoStatus::Done => write!(f, "done"),
            TodoStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Where a task can be done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoContext {
    #[default]
    Any,
    Home,
    Work,
    Gym,
    Errands,
}

impl fmt::Display for TodoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoContext::Any => write!(f, "any"),
            TodoContext::Home => write!(f, "home"),
            TodoContext::Work => write!(f, "work"),
            TodoContext::Gym => write!(f, "gym"),
            TodoContext::Errands => write!(f, "errands"),
        }
    }
}

impl std::str::FromStr for TodoContext {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any" | "" => Ok(TodoContext::Any),
            "home" => Ok(TodoContext::Home),
            "work" => Ok(TodoContext::Work),
            "gym" => Ok(TodoContext::Gym),
            "errands" => Ok(TodoContext::Errands),
            other => Err(format!("Unknown task context: {}", other)),
        }
    }
}

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub status: TodoStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub context: TodoContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<chrono::NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
