//! Outbound notification seam used by the trigger scheduler.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::error::NotifyError;

/// Text formatting hint for the delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatting {
    Plain,
    Markdown,
}

impl Formatting {
    /// Telegram `parse_mode` value, if any.
    pub fn parse_mode(self) -> Option<&'static str> {
        match self {
            Formatting::Plain => None,
            Formatting::Markdown => Some("Markdown"),
        }
    }
}

/// Delivers messages to the user.
///
/// `Ok` means the channel acknowledged the message; only then may the caller
/// treat a trigger as sent.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a free-form message.
    async fn send_message(&self, text: &str, formatting: Formatting) -> Result<(), NotifyError>;

    /// Send a titled alert and return the channel's message id.
    async fn send_alert(
        &self,
        title: &str,
        message: &str,
        alert_key: Option<&str>,
        category: &str,
    ) -> Result<String, NotifyError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Format an alert the way every channel renders it.
pub fn format_alert(title: &str, message: &str, category: &str) -> String {
    let icon = match category {
        "health" => "💪",
        "calendar" => "📅",
        "task" => "✅",
        _ => "🔔",
    };
    if message.trim().is_empty() || message.trim() == title.trim() {
        format!("{} *{}*", icon, title)
    } else {
        format!("{} *{}*\n\n{}", icon, title, message)
    }
}

/// Writes notifications to the log and acknowledges them. Used when no
/// delivery channel is configured.
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, text: &str, _formatting: Formatting) -> Result<(), NotifyError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        info!(notifier = "log", "{}", text);
        Ok(())
    }

    async fn send_alert(
        &self,
        title: &str,
        message: &str,
        alert_key: Option<&str>,
        category: &str,
    ) -> Result<String, NotifyError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            notifier = "log",
            alert_key = alert_key.unwrap_or("-"),
            "{}",
            format_alert(title, message, category)
        );
        Ok(format!("log-{}", n))
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_alert() {
        assert_eq!(
            format_alert("Standup", "Room 4", "alert"),
            "🔔 *Standup*\n\nRoom 4"
        );
        assert_eq!(format_alert("Standup", "Standup", "alert"), "🔔 *Standup*");
        assert_eq!(format_alert("Sleep", "", "health"), "💪 *Sleep*");
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(Formatting::Markdown.parse_mode(), Some("Markdown"));
        assert_eq!(Formatting::Plain.parse_mode(), None);
    }

    #[tokio::test]
    async fn test_log_notifier_acknowledges() {
        let notifier = LogNotifier::new();
        notifier
            .send_message("hello", Formatting::Plain)
            .await
            .unwrap();
        let id = notifier
            .send_alert("t", "m", Some("trigger_1"), "alert")
            .await
            .unwrap();
        assert_eq!(id, "log-2");
        assert_eq!(notifier.sent_count(), 2);
    }
}
