//! Background delivery loop for due reminders and alerts.
//!
//! Each tick takes the due set, then for every trigger holds the store lock
//! across "still pending? -> send -> transition". A cancel that races a tick
//! therefore lands either before the send (the trigger is skipped) or after the
//! transition (the cancel fails because the trigger is already sent).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::NotifyError;
use crate::notifier::{Formatting, Notifier};
use crate::trigger::TriggerStore;
use crate::types::{Trigger, TriggerKind};

/// Outcome counts for one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
    pub rearmed: usize,
    pub dead_lettered: usize,
    pub skipped: usize,
    pub purged: usize,
}

/// Polls the trigger store and delivers due entries through a [`Notifier`].
pub struct TriggerScheduler {
    store: Arc<TriggerStore>,
    notifier: Arc<dyn Notifier>,
    shutdown: Arc<Notify>,
    poll_interval: Duration,
    send_timeout: Duration,
    give_up_after: Option<chrono::Duration>,
}

impl TriggerScheduler {
    /// Create a scheduler using the store's trigger config for timing.
    pub fn new(store: Arc<TriggerStore>, notifier: Arc<dyn Notifier>) -> Self {
        let config = store.config();
        let give_up_after = (config.give_up_after_hours > 0)
            .then(|| chrono::Duration::hours(config.give_up_after_hours));
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            send_timeout: Duration::from_secs(config.send_timeout_secs.max(1)),
            give_up_after,
            store,
            notifier,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    ///
    /// Shutdown is only observed between ticks, so a tick that has started
    /// always finishes its transitions.
    pub async fn run(&self) {
        info!(
            notifier = self.notifier.name(),
            poll_secs = self.poll_interval.as_secs_f64(),
            "Trigger scheduler started"
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    info!("Trigger scheduler stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            let report = self.tick(Utc::now()).await;
            if report.due > 0 || report.purged > 0 {
                info!(
                    due = report.due,
                    sent = report.sent,
                    failed = report.failed,
                    rearmed = report.rearmed,
                    dead_lettered = report.dead_lettered,
                    purged = report.purged,
                    "Scheduler tick"
                );
            }
        }
    }

    /// Signal the loop to stop after the current tick.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Deliver everything due at `now`, then purge expired entries.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let due: Vec<Uuid> = self
            .store
            .lock()
            .await
            .due(now)
            .into_iter()
            .map(|t| t.id)
            .collect();
        report.due = due.len();

        for id in due {
            self.deliver(id, now, &mut report).await;
        }

        match self.store.purge_expired(now).await {
            Ok(purged) => report.purged = purged,
            Err(e) => warn!(error = %e, "Trigger purge failed"),
        }
        report
    }

    async fn deliver(&self, id: Uuid, now: DateTime<Utc>, report: &mut TickReport) {
        let mut guard = self.store.lock().await;
        let trigger = match guard.get(id) {
            Some(t) if t.is_due(now) => t.clone(),
            _ => {
                debug!(trigger_id = %id, "Trigger no longer due, skipping");
                report.skipped += 1;
                return;
            }
        };

        let result = match tokio::time::timeout(self.send_timeout, self.send(&trigger)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.send_timeout.as_secs())),
        };

        match result {
            Ok(()) => match guard.mark_sent(id, now) {
                Ok((_, rearmed)) => {
                    report.sent += 1;
                    if rearmed.is_some() {
                        report.rearmed += 1;
                    }
                }
                // Delivered but not recorded: the next tick sends it again.
                Err(e) => error!(trigger_id = %id, error = %e, "Failed to record delivery"),
            },
            Err(e) => {
                report.failed += 1;
                warn!(
                    trigger_id = %id,
                    attempt = trigger.delivery_attempts + 1,
                    error = %e,
                    "Trigger delivery failed"
                );
                if self.should_give_up(&trigger, now) {
                    match guard.dead_letter(id, &e.to_string(), now) {
                        Ok((_, rearmed)) => {
                            report.dead_lettered += 1;
                            if rearmed.is_some() {
                                report.rearmed += 1;
                            }
                            error!(
                                trigger_id = %id,
                                attempts = trigger.delivery_attempts + 1,
                                rearmed = ?rearmed.map(|t| t.id),
                                "Giving up on trigger delivery"
                            );
                        }
                        Err(e) => error!(trigger_id = %id, error = %e, "Failed to dead-letter trigger"),
                    }
                } else if let Err(e) = guard.record_failure(id, &e.to_string(), now) {
                    error!(trigger_id = %id, error = %e, "Failed to record delivery failure");
                }
            }
        }
    }

    async fn send(&self, trigger: &Trigger) -> Result<(), NotifyError> {
        match trigger.kind {
            TriggerKind::Reminder => {
                let text = format!("🔔 *Reminder*\n\n{}", trigger.message);
                self.notifier.send_message(&text, Formatting::Markdown).await
            }
            TriggerKind::Alert => {
                let key = format!("trigger_{}", trigger.id);
                let body = trigger.description.as_deref().unwrap_or(&trigger.message);
                self.notifier
                    .send_alert(&trigger.message, body, Some(&key), "alert")
                    .await
                    .map(|_| ())
            }
        }
    }

    /// The window runs from the first recorded failure, so a trigger that
    /// was never attempted before is always retried at least once.
    fn should_give_up(&self, trigger: &Trigger, now: DateTime<Utc>) -> bool {
        match (self.give_up_after, trigger.first_failed_at) {
            (Some(limit), Some(first)) => trigger.delivery_attempts > 0 && now - first > limit,
            _ => false,
        }
    }
}
