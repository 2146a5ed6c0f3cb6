//! Trigger lifecycle with validated transitions.
//!
//! Pending -> Sent (delivery acknowledged)
//! Pending -> Cancelled (user action or dead-letter)
//!
//! Sent and Cancelled are terminal; only retention purge removes them.

use crate::error::{TodoError, TriggerError};
use crate::types::{TodoStatus, TriggerStatus};

/// Validate that a trigger status transition is allowed.
pub fn validate_transition(from: TriggerStatus, to: TriggerStatus) -> Result<(), TriggerError> {
    let valid = matches!(
        (from, to),
        (TriggerStatus::Pending, TriggerStatus::Sent)
            | (TriggerStatus::Pending, TriggerStatus::Cancelled)
    );

    if valid {
        Ok(())
    } else {
        Err(TriggerError::InvalidTransition { from, to })
    }
}

/// Validate a to-do transition: Open -> Done, Open -> Cancelled.
pub fn validate_todo_transition(from: TodoStatus, to: TodoStatus) -> Result<(), TodoError> {
    let valid = matches!(
        (from, to),
        (TodoStatus::Open, TodoStatus::Done) | (TodoStatus::Open, TodoStatus::Cancelled)
    );

    if valid {
        Ok(())
    } else {
        Err(TodoError::InvalidTransition(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TriggerStatus; 3] = [
        TriggerStatus::Pending,
        TriggerStatus::Sent,
        TriggerStatus::Cancelled,
    ];

    #[test]
    fn test_pending_to_sent() {
        assert!(validate_transition(TriggerStatus::Pending, TriggerStatus::Sent).is_ok());
    }

    #[test]
    fn test_pending_to_cancelled() {
        assert!(validate_transition(TriggerStatus::Pending, TriggerStatus::Cancelled).is_ok());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [TriggerStatus::Sent, TriggerStatus::Cancelled] {
            for to in ALL {
                let err = validate_transition(from, to).unwrap_err();
                assert!(matches!(err, TriggerError::InvalidTransition { .. }));
            }
        }
    }

    #[test]
    fn test_pending_to_pending_rejected() {
        assert!(validate_transition(TriggerStatus::Pending, TriggerStatus::Pending).is_err());
    }

    #[test]
    fn test_todo_transitions() {
        assert!(validate_todo_transition(TodoStatus::Open, TodoStatus::Done).is_ok());
        assert!(validate_todo_transition(TodoStatus::Open, TodoStatus::Cancelled).is_ok());
        assert!(validate_todo_transition(TodoStatus::Done, TodoStatus::Open).is_err());
        assert!(validate_todo_transition(TodoStatus::Cancelled, TodoStatus::Done).is_err());
    }
}
