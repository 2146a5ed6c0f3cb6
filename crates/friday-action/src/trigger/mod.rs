//! Persisted reminder/alert store.
//!
//! The store exclusively owns trigger lifecycle. All reads and writes go
//! through one async mutex; every mutation rewrites the backing file before the
//! in-memory state changes, so a failed flush leaves both untouched.

pub mod state_machine;

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use friday_core::config::TriggerConfig;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::TriggerError;
use crate::persist;
use crate::time_spec::TriggerSpec;
use crate::types::{NewTrigger, Trigger, TriggerFilter, TriggerKind, TriggerStatus};
use state_machine::validate_transition;

/// Word-overlap ratio above which two alert titles count as the same alert.
const SIMILAR_TITLE_THRESHOLD: f64 = 0.7;

/// Prefix written to `last_error` when delivery is abandoned.
pub const DEAD_LETTER_PREFIX: &str = "dead-letter:";

struct Inner {
    triggers: Vec<Trigger>,
    path: Option<PathBuf>,
}

/// Reminder and alert store backed by a JSON file.
pub struct TriggerStore {
    inner: Mutex<Inner>,
    tz: Tz,
    config: TriggerConfig,
}

impl TriggerStore {
    /// Open the store at `path`, dropping settled entries past retention.
    pub fn open(
        path: impl Into<PathBuf>,
        config: TriggerConfig,
        tz: Tz,
    ) -> Result<Self, TriggerError> {
        let path = path.into();
        let triggers: Vec<Trigger> = persist::load_list(&path).map_err(TriggerError::Storage)?;
        let loaded = triggers.len();

        let cutoff = Utc::now() - Duration::days(config.retention_days);
        let kept: Vec<Trigger> = triggers
            .into_iter()
            .filter(|t| !is_expired(t, cutoff))
            .collect();
        let purged = loaded - kept.len();
        if purged > 0 {
            persist::write_list(&path, &kept).map_err(TriggerError::Storage)?;
        }

        info!(
            path = %path.display(),
            loaded,
            purged,
            pending = kept.iter().filter(|t| t.is_pending()).count(),
            "Trigger store opened"
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                triggers: kept,
                path: Some(path),
            }),
            tz,
            config,
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(config: TriggerConfig, tz: Tz) -> Self {
        Self {
            inner: Mutex::new(Inner {
                triggers: Vec::new(),
                path: None,
            }),
            tz,
            config,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Exclusive access for multi-step work such as check-send-transition.
    pub async fn lock(&self) -> TriggerGuard<'_> {
        TriggerGuard {
            inner: self.inner.lock().await,
            tz: self.tz,
            config: &self.config,
        }
    }

    pub async fn create(&self, new: NewTrigger, now: DateTime<Utc>) -> Result<Trigger, TriggerError> {
        self.lock().await.create(new, now)
    }

    pub async fn cancel(&self, id: Uuid, now: DateTime<Utc>) -> Result<Trigger, TriggerError> {
        self.lock().await.cancel(id, now)
    }

    pub async fn cancel_all(
        &self,
        kind: TriggerKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<Trigger>, TriggerError> {
        self.lock().await.cancel_all(kind, now)
    }

    pub async fn mark_sent(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Trigger, Option<Trigger>), TriggerError> {
        self.lock().await.mark_sent(id, now)
    }

    pub async fn update_time(
        &self,
        id: Uuid,
        spec: &TriggerSpec,
        now: DateTime<Utc>,
    ) -> Result<Trigger, TriggerError> {
        self.lock().await.update_time(id, spec, now)
    }

    pub async fn get(&self, id: Uuid) -> Result<Trigger, TriggerError> {
        self.lock()
            .await
            .get(id)
            .cloned()
            .ok_or(TriggerError::NotFound(id))
    }

    /// Matching triggers, soonest first.
    pub async fn list(&self, filter: TriggerFilter) -> Vec<Trigger> {
        self.lock().await.list(filter)
    }

    /// Pending triggers of one kind, soonest first.
    pub async fn pending(&self, kind: TriggerKind) -> Vec<Trigger> {
        self.list(TriggerFilter::pending(kind)).await
    }

    pub async fn find_similar(&self, kind: TriggerKind, title: &str) -> Option<Trigger> {
        self.lock().await.find_similar(kind, title).cloned()
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, TriggerError> {
        self.lock().await.purge_expired(now)
    }
}

/// Held lock on the store. Every mutating method flushes before returning.
pub struct TriggerGuard<'a> {
    inner: MutexGuard<'a, Inner>,
    tz: Tz,
    config: &'a TriggerConfig,
}

impl TriggerGuard<'_> {
    pub fn get(&self, id: Uuid) -> Option<&Trigger> {
        self.inner.triggers.iter().find(|t| t.id == id)
    }

    pub fn list(&self, filter: TriggerFilter) -> Vec<Trigger> {
        let mut result: Vec<Trigger> = self
            .inner
            .triggers
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        result.sort_by_key(|t| t.remind_at);
        result
    }

    /// Pending, time-based triggers with `remind_at <= now`, oldest first.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<Trigger> {
        let mut due: Vec<Trigger> = self
            .inner
            .triggers
            .iter()
            .filter(|t| t.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|t| t.remind_at);
        due
    }

    /// A pending trigger of the same kind whose title matches exactly or shares
    /// most of its words with `title`.
    pub fn find_similar(&self, kind: TriggerKind, title: &str) -> Option<&Trigger> {
        let wanted = title.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        let wanted_words: HashSet<&str> = wanted.split_whitespace().collect();

        self.inner
            .triggers
            .iter()
            .filter(|t| t.is_pending() && t.kind == kind)
            .find(|t| {
                let existing = t.message.trim().to_lowercase();
                if existing == wanted {
                    return true;
                }
                let existing_words: HashSet<&str> = existing.split_whitespace().collect();
                let max_len = wanted_words.len().max(existing_words.len());
                if max_len == 0 {
                    return false;
                }
                let overlap = wanted_words.intersection(&existing_words).count();
                overlap as f64 / max_len as f64 > SIMILAR_TITLE_THRESHOLD
            })
    }

    pub fn create(&mut self, new: NewTrigger, now: DateTime<Utc>) -> Result<Trigger, TriggerError> {
        let message = new.message.trim().to_string();
        if message.is_empty() {
            return Err(TriggerError::Validation(
                "A reminder needs a message".to_string(),
            ));
        }
        let condition = match &new.spec {
            TriggerSpec::Condition(c) if c.trim().is_empty() => {
                return Err(TriggerError::Validation(
                    "Condition must not be empty".to_string(),
                ))
            }
            TriggerSpec::Condition(c) => Some(c.trim().to_string()),
            _ => None,
        };
        let remind_at = new
            .spec
            .resolve(now.with_timezone(&self.tz), self.config.default_hour)?
            .with_timezone(&Utc);

        let trigger = Trigger {
            id: Uuid::new_v4(),
            kind: new.kind,
            message,
            description: new.description,
            remind_at,
            created_at: now,
            status: TriggerStatus::Pending,
            recurring_pattern: new.recurring,
            condition,
            priority: new.priority,
            sent_at: None,
            cancelled_at: None,
            delivery_attempts: 0,
            last_error: None,
            first_failed_at: None,
            previous_id: None,
        };

        let created = trigger.clone();
        self.commit(move |triggers| {
            triggers.push(trigger);
            Ok(())
        })?;
        info!(
            trigger_id = %created.id,
            kind = %created.kind,
            remind_at = %created.remind_at,
            "Trigger created"
        );
        Ok(created)
    }

    pub fn cancel(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<Trigger, TriggerError> {
        let cancelled = self.commit(|triggers| {
            let t = find_mut(triggers, id)?;
            validate_transition(t.status, TriggerStatus::Cancelled)?;
            t.status = TriggerStatus::Cancelled;
            t.cancelled_at = Some(now);
            Ok(t.clone())
        })?;
        info!(trigger_id = %id, "Trigger cancelled");
        Ok(cancelled)
    }

    /// Cancel every pending trigger of `kind` in one flush.
    pub fn cancel_all(
        &mut self,
        kind: TriggerKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<Trigger>, TriggerError> {
        self.commit(|triggers| {
            let mut cancelled = Vec::new();
            for t in triggers
                .iter_mut()
                .filter(|t| t.is_pending() && t.kind == kind)
            {
                t.status = TriggerStatus::Cancelled;
                t.cancelled_at = Some(now);
                cancelled.push(t.clone());
            }
            Ok(cancelled)
        })
    }

    /// Record an acknowledged delivery. A recurring trigger is re-armed as a
    /// new pending entry for its next occurrence after `now`.
    pub fn mark_sent(
        &mut self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Trigger, Option<Trigger>), TriggerError> {
        let tz = self.tz;
        let result = self.commit(|triggers| {
            let t = find_mut(triggers, id)?;
            validate_transition(t.status, TriggerStatus::Sent)?;
            t.status = TriggerStatus::Sent;
            t.sent_at = Some(now);
            t.last_error = None;
            t.first_failed_at = None;
            let sent = t.clone();

            let rearmed = next_occurrence(&sent, tz, now);
            if let Some(next) = &rearmed {
                triggers.push(next.clone());
            }
            Ok((sent, rearmed))
        })?;

        info!(
            trigger_id = %id,
            rearmed = ?result.1.as_ref().map(|t| t.id),
            "Trigger sent"
        );
        Ok(result)
    }

    /// Note a failed delivery; the trigger stays pending. The first failure
    /// of a run is timestamped so the give-up window starts there.
    pub fn record_failure(
        &mut self,
        id: Uuid,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<Trigger, TriggerError> {
        self.commit(|triggers| {
            let t = find_mut(triggers, id)?;
            if !t.is_pending() {
                return Err(TriggerError::InvalidTransition {
                    from: t.status,
                    to: TriggerStatus::Pending,
                });
            }
            t.delivery_attempts += 1;
            t.last_error = Some(error.to_string());
            t.first_failed_at.get_or_insert(now);
            Ok(t.clone())
        })
    }

    /// Abandon delivery: the trigger is cancelled with a dead-letter reason.
    /// A recurring series continues with its next occurrence.
    pub fn dead_letter(
        &mut self,
        id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Trigger, Option<Trigger>), TriggerError> {
        let tz = self.tz;
        self.commit(|triggers| {
            let t = find_mut(triggers, id)?;
            validate_transition(t.status, TriggerStatus::Cancelled)?;
            t.status = TriggerStatus::Cancelled;
            t.cancelled_at = Some(now);
            t.last_error = Some(format!("{} {}", DEAD_LETTER_PREFIX, reason));
            let dead = t.clone();

            let rearmed = next_occurrence(&dead, tz, now);
            if let Some(next) = &rearmed {
                triggers.push(next.clone());
            }
            Ok((dead, rearmed))
        })
    }

    /// Move a pending trigger to a new time.
    pub fn update_time(
        &mut self,
        id: Uuid,
        spec: &TriggerSpec,
        now: DateTime<Utc>,
    ) -> Result<Trigger, TriggerError> {
        if spec.is_condition() {
            return Err(TriggerError::Validation(
                "A trigger can only be rescheduled to a time".to_string(),
            ));
        }
        let remind_at = spec
            .resolve(now.with_timezone(&self.tz), self.config.default_hour)?
            .with_timezone(&Utc);

        let updated = self.commit(|triggers| {
            let t = find_mut(triggers, id)?;
            if !t.is_pending() {
                return Err(TriggerError::Validation(format!(
                    "Only pending triggers can be rescheduled (this one is {})",
                    t.status
                )));
            }
            t.remind_at = remind_at;
            t.condition = None;
            t.delivery_attempts = 0;
            t.last_error = None;
            t.first_failed_at = None;
            Ok(t.clone())
        })?;
        info!(trigger_id = %id, remind_at = %remind_at, "Trigger rescheduled");
        Ok(updated)
    }

    /// Drop settled entries older than the retention window.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> Result<usize, TriggerError> {
        let cutoff = now - Duration::days(self.config.retention_days);
        if !self.inner.triggers.iter().any(|t| is_expired(t, cutoff)) {
            return Ok(0);
        }
        self.commit(|triggers| {
            let before = triggers.len();
            triggers.retain(|t| !is_expired(t, cutoff));
            Ok(before - triggers.len())
        })
    }

    fn commit<R>(
        &mut self,
        f: impl FnOnce(&mut Vec<Trigger>) -> Result<R, TriggerError>,
    ) -> Result<R, TriggerError> {
        let mut next = self.inner.triggers.clone();
        let out = f(&mut next)?;
        if let Some(path) = &self.inner.path {
            persist::write_list(path, &next).map_err(TriggerError::Storage)?;
        }
        self.inner.triggers = next;
        Ok(out)
    }
}

fn find_mut(triggers: &mut [Trigger], id: Uuid) -> Result<&mut Trigger, TriggerError> {
    triggers
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(TriggerError::NotFound(id))
}

/// The pending entry that continues a recurring series after `settled`.
fn next_occurrence(settled: &Trigger, tz: Tz, now: DateTime<Utc>) -> Option<Trigger> {
    let pattern = settled.recurring_pattern?;
    match pattern.next_after(settled.remind_at.with_timezone(&tz), now.with_timezone(&tz)) {
        Some(next) => Some(Trigger {
            id: Uuid::new_v4(),
            remind_at: next.with_timezone(&Utc),
            created_at: now,
            status: TriggerStatus::Pending,
            sent_at: None,
            cancelled_at: None,
            delivery_attempts: 0,
            last_error: None,
            first_failed_at: None,
            previous_id: Some(settled.id),
            ..settled.clone()
        }),
        None => {
            warn!(trigger_id = %settled.id, "No next occurrence for recurring trigger");
            None
        }
    }
}

/// Settled entries age from when they settled; pending entries never expire.
fn is_expired(trigger: &Trigger, cutoff: DateTime<Utc>) -> bool {
    let settled_at = match trigger.status {
        TriggerStatus::Pending => return false,
        TriggerStatus::Sent => trigger.sent_at,
        TriggerStatus::Cancelled => trigger.cancelled_at,
    };
    settled_at.unwrap_or(trigger.created_at) < cutoff
}
