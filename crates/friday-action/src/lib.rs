//! Reminders, alerts and to-do tasks.
//!
//! [`TriggerStore`] owns the persisted reminder/alert queue, [`TriggerScheduler`]
//! delivers due entries through a [`Notifier`], and [`TodoStore`] keeps the
//! task list.

pub mod error;
pub mod notifier;
mod persist;
pub mod scheduler;
pub mod telegram;
pub mod time_spec;
pub mod todo;
pub mod trigger;
pub mod types;

pub use error::{NotifyError, TodoError, TriggerError};
pub use notifier::{Formatting, LogNotifier, Notifier};
pub use scheduler::{TickReport, TriggerScheduler};
pub use telegram::TelegramNotifier;
pub use time_spec::TriggerSpec;
pub use todo::{NewTodo, TodoStore};
pub use trigger::{TriggerGuard, TriggerStore};
pub use types::*;
