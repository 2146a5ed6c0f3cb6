//! Interfaces to external services the handlers consult.
//!
//! Each is optional at assembly time; handlers answer gracefully when the
//! collaborator they need is absent.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ServiceError;

/// A passage retrieved from the user's notes.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub source: String,
    pub text: String,
    pub score: f32,
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedChunk>, ServiceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub location: Option<String>,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Events overlapping `[start, end)`, in any order.
    async fn events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, ServiceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ServiceError>;
}

#[async_trait]
pub trait HealthProvider: Send + Sync {
    /// Plain-text summary of the health data relevant to `query`.
    async fn summary(&self, query: &str, now: DateTime<Utc>) -> Result<String, ServiceError>;
}

/// A note to be written.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub folder: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SavedNote {
    pub title: String,
    pub folder: String,
    pub path: PathBuf,
}

pub trait NoteStore: Send + Sync {
    fn create_note(&self, note: NewNote, now: DateTime<Utc>) -> Result<SavedNote, ServiceError>;
}

/// A fact the assistant was asked to remember.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryItem {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Long-lived facts about the user, searched by keyword.
pub trait MemoryStore: Send + Sync {
    fn save(&self, content: &str, now: DateTime<Utc>) -> Result<MemoryItem, ServiceError>;

    /// Best matches for `query`, most relevant first.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<MemoryItem>, ServiceError>;

    /// Most recent first.
    fn list(&self, limit: usize) -> Result<Vec<MemoryItem>, ServiceError>;

    /// Returns false when `id` does not exist.
    fn delete(&self, id: i64) -> Result<bool, ServiceError>;
}
