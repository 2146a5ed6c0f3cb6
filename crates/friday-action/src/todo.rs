//! To-do task store.
//!
//! Tasks are created open and move to done or cancelled once. The list is
//! kept in memory and flushed to a JSON file after every change.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::TodoError;
use crate::persist;
use crate::trigger::state_machine::validate_todo_transition;
use crate::types::{Priority, Todo, TodoContext, TodoStatus};

/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTodo {
    pub title: String,
    pub priority: Priority,
    pub context: TodoContext,
    pub due_date: Option<NaiveDate>,
}

/// Task store with CRUD operations and lifecycle management.
pub struct TodoStore {
    tasks: Mutex<Vec<Todo>>,
    path: Option<PathBuf>,
}

impl TodoStore {
    /// Create an empty store that never touches disk.
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            path: None,
        }
    }

    /// Open a file-backed store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TodoError> {
        let path = path.into();
        let tasks: Vec<Todo> = persist::load_list(&path).map_err(TodoError::Storage)?;
        info!(path = %path.display(), count = tasks.len(), "Task store opened");
        Ok(Self {
            tasks: Mutex::new(tasks),
            path: Some(path),
        })
    }

    pub fn create(&self, new: NewTodo, now: DateTime<Utc>) -> Result<Todo, TodoError> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(TodoError::Validation("A task needs a title".to_string()));
        }
        let task = Todo {
            id: Uuid::new_v4(),
            title,
            status: TodoStatus::Open,
            priority: new.priority,
            context: new.context,
            due_date: new.due_date,
            created_at: now,
            completed_at: None,
        };

        let created = task.clone();
        self.commit(move |tasks| {
            tasks.push(task);
            Ok(())
        })?;
        info!(task_id = %created.id, "Task created");
        Ok(created)
    }

    pub fn get(&self, id: Uuid) -> Result<Todo, TodoError> {
        let tasks = self.lock()?;
        tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(TodoError::NotFound(id))
    }

    /// Update task status with state machine validation.
    pub fn update_status(
        &self,
        id: Uuid,
        new_status: TodoStatus,
        now: DateTime<Utc>,
    ) -> Result<Todo, TodoError> {
        self.commit(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(TodoError::NotFound(id))?;
            validate_todo_transition(task.status, new_status)?;
            task.status = new_status;
            if new_status == TodoStatus::Done {
                task.completed_at = Some(now);
            }
            Ok(task.clone())
        })
    }

    pub fn complete(&self, id: Uuid, now: DateTime<Utc>) -> Result<Todo, TodoError> {
        self.update_status(id, TodoStatus::Done, now)
    }

    /// List tasks with optional filters, most pressing first.
    pub fn list(
        &self,
        status: Option<TodoStatus>,
        context: Option<TodoContext>,
        limit: Option<usize>,
    ) -> Vec<Todo> {
        let tasks = match self.tasks.lock() {
            Ok(t) => t,
            Err(_) => return vec![],
        };

        let mut result: Vec<Todo> = tasks
            .iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .filter(|t| context.map_or(true, |c| t.context == c || t.context == TodoContext::Any))
            .cloned()
            .collect();

        result.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| match (a.due_date, b.due_date) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        if let Some(limit) = limit {
            result.truncate(limit);
        }
        result
    }

    /// Open tasks due on or before `date`.
    pub fn due_by(&self, date: NaiveDate) -> Vec<Todo> {
        self.list(Some(TodoStatus::Open), None, None)
            .into_iter()
            .filter(|t| t.due_date.is_some_and(|d| d <= date))
            .collect()
    }

    /// Find one open task by id prefix or case-insensitive title fragment.
    pub fn find_open(&self, query: &str) -> Result<Todo, TodoError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(TodoError::Validation("Which task?".to_string()));
        }
        let open = self.list(Some(TodoStatus::Open), None, None);

        if let Some(t) = open.iter().find(|t| t.id.to_string().starts_with(&needle)) {
            return Ok(t.clone());
        }
        let mut matches: Vec<&Todo> = open
            .iter()
            .filter(|t| t.title.to_lowercase().contains(&needle))
            .collect();
        match matches.len() {
            0 => Err(TodoError::Validation(format!(
                "No open task matches '{}'",
                query.trim()
            ))),
            1 => Ok(matches.remove(0).clone()),
            n => {
                if let Some(exact) = matches.iter().find(|t| t.title.to_lowercase() == needle) {
                    return Ok((*exact).clone());
                }
                Err(TodoError::Validation(format!(
                    "{} open tasks match '{}', be more specific",
                    n,
                    query.trim()
                )))
            }
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Todo>>, TodoError> {
        self.tasks
            .lock()
            .map_err(|e| TodoError::Storage(format!("Lock poisoned: {}", e)))
    }

    fn commit<R>(
        &self,
        f: impl FnOnce(&mut Vec<Todo>) -> Result<R, TodoError>,
    ) -> Result<R, TodoError> {
        let mut tasks = self.lock()?;
        let mut next = tasks.clone();
        let out = f(&mut next)?;
        if let Some(path) = &self.path {
            persist::write_list(path, &next).map_err(TodoError::Storage)?;
        }
        *tasks = next;
        Ok(out)
    }
}

impl Default for TodoStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-10-16T14:00:00Z".parse().unwrap()
    }

    fn todo(title: &str, priority: Priority) -> NewTodo {
        NewTodo {
            title: title.to_string(),
            priority,
            ..NewTodo::default()
        }
    }

    #[test]
    fn test_create_task() {
        let store = TodoStore::new();
        let task = store.create(todo("Buy milk", Priority::Low), now()).unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.status, TodoStatus::Open);
        assert_eq!(store.get(task.id).unwrap(), task);
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let store = TodoStore::new();
        assert!(matches!(
            store.create(todo("  ", Priority::Low), now()),
            Err(TodoError::Validation(_))
        ));
    }

    #[test]
    fn test_complete_sets_timestamp_once() {
        let store = TodoStore::new();
        let task = store.create(todo("Ship it", Priority::High), now()).unwrap();
        let done = store.complete(task.id, now()).unwrap();
        assert_eq!(done.status, TodoStatus::Done);
        assert_eq!(done.completed_at, Some(now()));

        assert!(matches!(
            store.complete(task.id, now()),
            Err(TodoError::InvalidTransition(TodoStatus::Done, TodoStatus::Done))
        ));
    }

    #[test]
    fn test_list_orders_by_priority_then_due() {
        let store = TodoStore::new();
        let low = store.create(todo("low", Priority::Low), now()).unwrap();
        let urgent = store.create(todo("urgent", Priority::Urgent), now()).unwrap();
        let high_later = store
            .create(
                NewTodo {
                    due_date: NaiveDate::from_ymd_opt(2026, 10, 20),
                    ..todo("high later", Priority::High)
                },
                now(),
            )
            .unwrap();
        let high_sooner = store
            .create(
                NewTodo {
                    due_date: NaiveDate::from_ymd_opt(2026, 10, 17),
                    ..todo("high sooner", Priority::High)
                },
                now(),
            )
            .unwrap();

        let ids: Vec<Uuid> = store
            .list(Some(TodoStatus::Open), None, None)
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![urgent.id, high_sooner.id, high_later.id, low.id]);
        assert_eq!(store.list(None, None, Some(2)).len(), 2);
    }

    #[test]
    fn test_list_context_includes_any() {
        let store = TodoStore::new();
        store
            .create(
                NewTodo {
                    context: TodoContext::Gym,
                    ..todo("squats", Priority::Medium)
                },
                now(),
            )
            .unwrap();
        store.create(todo("anywhere", Priority::Medium), now()).unwrap();

        assert_eq!(store.list(None, Some(TodoContext::Gym), None).len(), 2);
        assert_eq!(store.list(None, Some(TodoContext::Work), None).len(), 1);
    }

    #[test]
    fn test_due_by() {
        let store = TodoStore::new();
        store
            .create(
                NewTodo {
                    due_date: NaiveDate::from_ymd_opt(2026, 10, 15),
                    ..todo("overdue", Priority::Medium)
                },
                now(),
            )
            .unwrap();
        store.create(todo("someday", Priority::Medium), now()).unwrap();

        let due = store.due_by(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "overdue");
    }

    #[test]
    fn test_find_open() {
        let store = TodoStore::new();
        let report = store.create(todo("Write report", Priority::Medium), now()).unwrap();
        store.create(todo("Write email", Priority::Medium), now()).unwrap();

        assert_eq!(store.find_open("report").unwrap().id, report.id);
        assert_eq!(
            store.find_open(&report.id.to_string()[..8]).unwrap().id,
            report.id
        );
        assert!(store.find_open("write").is_err());
        assert!(store.find_open("gardening").is_err());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let id = {
            let store = TodoStore::open(&path).unwrap();
            let t = store.create(todo("persist", Priority::High), now()).unwrap();
            store.complete(t.id, now()).unwrap();
            t.id
        };
        let store = TodoStore::open(&path).unwrap();
        let loaded = store.get(id).unwrap();
        assert_eq!(loaded.status, TodoStatus::Done);
        assert_eq!(loaded.priority, Priority::High);
    }
}
