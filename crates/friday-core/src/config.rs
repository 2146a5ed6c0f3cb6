use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FridayError, Result};

/// Top-level configuration for the Friday backend.
///
/// Loaded from `friday.toml` by default. Each section corresponds to one
/// subsystem; every section falls back to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FridayConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub notes: NotesConfig,
}

impl FridayConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FridayConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.general.timezone()?;
        if self.triggers.poll_interval_secs == 0 {
            return Err(FridayError::Config(
                "triggers.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.triggers.send_timeout_secs == 0 || self.llm.timeout_secs == 0 {
            return Err(FridayError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.triggers.default_hour > 23 {
            return Err(FridayError::Config(format!(
                "triggers.default_hour must be 0-23, got {}",
                self.triggers.default_hour
            )));
        }
        if self.chat.history_turns == 0 {
            return Err(FridayError::Config(
                "chat.history_turns must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.data_dir)
    }

    /// Path of the persisted reminder/alert file.
    pub fn triggers_path(&self) -> PathBuf {
        self.data_dir().join(&self.triggers.file)
    }

    pub fn todos_path(&self) -> PathBuf {
        self.data_dir().join("tasks.json")
    }

    pub fn conversations_path(&self) -> PathBuf {
        self.data_dir().join("conversations.db")
    }

    pub fn memories_path(&self) -> PathBuf {
        self.data_dir().join("memories.db")
    }

    /// Notes vault directory; defaults to `<data_dir>/vault`.
    pub fn vault_dir(&self) -> PathBuf {
        match &self.notes.vault_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.data_dir().join("vault"),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for the trigger file, task file and conversation database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// IANA timezone name used to interpret times of day.
    pub timezone: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            log_level: "info".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

impl GeneralConfig {
    /// Parse the configured timezone.
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| FridayError::Config(format!("Unknown timezone: {}", self.timezone)))
    }
}

/// Text-completion endpoint settings (OpenAI-compatible chat API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Timeout for synthesis calls.
    pub timeout_secs: u64,
    /// Timeout for the routing call; classification falls back on expiry.
    pub classifier_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.1:8b".to_string(),
            api_key: None,
            temperature: 0.3,
            max_tokens: 1024,
            timeout_secs: 60,
            classifier_timeout_secs: 30,
        }
    }
}

/// Chat pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of user/assistant exchanges fed back as history.
    pub history_turns: usize,
    pub max_message_length: usize,
    pub assistant_name: String,
    /// System prompt for the synthesis pass when a handler supplies none.
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_turns: 10,
            max_message_length: 4000,
            assistant_name: "Friday".to_string(),
            system_prompt: "You are Friday, a concise personal assistant. Answer the user's \
                question using the provided context when it is relevant. If the context does \
                not contain the answer, say so briefly instead of guessing."
                .to_string(),
        }
    }
}

/// Reminder/alert engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub poll_interval_secs: u64,
    /// SENT and CANCELLED entries older than this are dropped on load.
    pub retention_days: i64,
    pub send_timeout_secs: u64,
    /// Hour used when a weekday or date is given without a time.
    pub default_hour: u32,
    /// A failing trigger overdue by more than this is dead-lettered. 0 disables.
    pub give_up_after_hours: i64,
    /// File name under `general.data_dir`.
    pub file: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            retention_days: 7,
            send_timeout_secs: 15,
            default_hour: 9,
            give_up_after_hours: 24,
            file: "reminders.json".to_string(),
        }
    }
}

/// Telegram delivery settings. Both fields must be set for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        matches!((&self.bot_token, &self.chat_id), (Some(t), Some(c)) if !t.is_empty() && !c.is_empty())
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// When set, protected routes require `x-api-key` or a bearer token.
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: None,
        }
    }
}

/// Markdown notes vault settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    pub vault_dir: Option<String>,
    pub default_folder: String,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            vault_dir: None,
            default_folder: "Inbox".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = FridayConfig::default();
        assert_eq!(config.general.data_dir, "./data");
        assert_eq!(config.general.timezone, "UTC");
        assert_eq!(config.chat.history_turns, 10);
        assert_eq!(config.triggers.poll_interval_secs, 30);
        assert_eq!(config.triggers.retention_days, 7);
        assert_eq!(config.triggers.default_hour, 9);
        assert_eq!(config.api.port, 8080);
        assert!(config.api.api_key.is_none());
        assert!(!config.telegram.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/var/lib/friday"
timezone = "America/Sao_Paulo"

[triggers]
poll_interval_secs = 10
give_up_after_hours = 0

[telegram]
bot_token = "123:abc"
chat_id = "42"
"#;
        let file = create_temp_config(content);
        let config = FridayConfig::load(file.path()).unwrap();

        assert_eq!(config.general.data_dir, "/var/lib/friday");
        assert_eq!(config.general.timezone().unwrap(), chrono_tz::America::Sao_Paulo);
        assert_eq!(config.triggers.poll_interval_secs, 10);
        assert_eq!(config.triggers.give_up_after_hours, 0);
        // Omitted fields keep defaults.
        assert_eq!(config.triggers.retention_days, 7);
        assert!(config.telegram.is_configured());
        assert_eq!(
            config.triggers_path(),
            PathBuf::from("/var/lib/friday/reminders.json")
        );
    }

    #[test]
    fn test_load_rejects_unknown_timezone() {
        let file = create_temp_config("[general]\ntimezone = \"Mars/Olympus\"\n");
        let err = FridayConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown timezone"));
    }

    #[test]
    fn test_load_rejects_zero_poll_interval() {
        let file = create_temp_config("[triggers]\npoll_interval_secs = 0\n");
        assert!(matches!(
            FridayConfig::load(file.path()),
            Err(FridayError::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = FridayConfig::load_or_default(Path::new("/does/not/exist/friday.toml"));
        assert_eq!(config.general.data_dir, "./data");
        assert_eq!(config.llm.timeout_secs, 60);
    }

    #[test]
    fn test_load_or_default_invalid_toml() {
        let file = create_temp_config("this is = = not toml");
        let config = FridayConfig::load_or_default(file.path());
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("friday.toml");

        let mut config = FridayConfig::default();
        config.api.port = 9191;
        config.chat.assistant_name = "Jarvis".to_string();
        config.save(&path).unwrap();

        let loaded = FridayConfig::load(&path).unwrap();
        assert_eq!(loaded.api.port, 9191);
        assert_eq!(loaded.chat.assistant_name, "Jarvis");
    }

    #[test]
    fn test_vault_dir_defaults_under_data_dir() {
        let mut config = FridayConfig::default();
        assert_eq!(config.vault_dir(), PathBuf::from("./data/vault"));
        config.notes.vault_dir = Some("/notes".to_string());
        assert_eq!(config.vault_dir(), PathBuf::from("/notes"));
        assert_eq!(config.memories_path(), PathBuf::from("./data/memories.db"));
    }

    #[test]
    fn test_telegram_requires_both_fields() {
        let config = TelegramConfig {
            bot_token: Some("token".to_string()),
            chat_id: Some(String::new()),
            ..TelegramConfig::default()
        };
        assert!(!config.is_configured());
    }
}
