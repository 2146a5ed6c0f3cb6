//! CLI argument definitions for the Friday binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use friday_core::config::FridayConfig;

pub const CONFIG_ENV: &str = "FRIDAY_CONFIG";
pub const PORT_ENV: &str = "FRIDAY_PORT";
pub const DATA_DIR_ENV: &str = "FRIDAY_DATA_DIR";

/// Friday — a personal assistant backend with reminders, alerts and chat.
#[derive(Parser, Debug)]
#[command(name = "friday", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Directory for triggers, tasks, conversations and the notes vault.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq, Default)]
pub enum Command {
    /// Run the HTTP API and the trigger scheduler (default).
    #[default]
    Serve,
    /// Send one message through the chat pipeline and print the answer.
    Chat {
        message: String,
        /// Continue an existing conversation.
        #[arg(short = 's', long = "session")]
        session: Option<String>,
    },
    /// Print stored reminders and alerts.
    Triggers {
        /// Include sent and cancelled entries.
        #[arg(short = 'a', long = "all")]
        all: bool,
    },
}

impl CliArgs {
    /// Priority: --config flag > FRIDAY_CONFIG > ./friday.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        resolve_config_path(self.config.clone(), std::env::var(CONFIG_ENV).ok())
    }

    /// Write flag and environment overrides into a loaded config.
    pub fn apply_overrides(&self, config: &mut FridayConfig) {
        apply_overrides(
            config,
            self.port,
            std::env::var(PORT_ENV).ok(),
            self.data_dir.clone(),
            std::env::var(DATA_DIR_ENV).ok(),
        );
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or_default()
    }
}

fn resolve_config_path(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.filter(|v| !v.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("friday.toml"))
}

fn apply_overrides(
    config: &mut FridayConfig,
    port_flag: Option<u16>,
    port_env: Option<String>,
    data_dir_flag: Option<PathBuf>,
    data_dir_env: Option<String>,
) {
    let env_port = port_env.and_then(|v| match v.trim().parse::<u16>() {
        Ok(p) => Some(p),
        Err(_) => {
            tracing::warn!(value = %v, "Ignoring invalid {}", PORT_ENV);
            None
        }
    });
    if let Some(port) = port_flag.or(env_port) {
        config.api.port = port;
    }

    let data_dir = data_dir_flag
        .map(|p| p.to_string_lossy().to_string())
        .or_else(|| data_dir_env.filter(|v| !v.trim().is_empty()));
    if let Some(dir) = data_dir {
        config.general.data_dir = dir;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_priority() {
        assert_eq!(
            resolve_config_path(Some("a.toml".into()), Some("b.toml".to_string())),
            PathBuf::from("a.toml")
        );
        assert_eq!(
            resolve_config_path(None, Some("b.toml".to_string())),
            PathBuf::from("b.toml")
        );
        assert_eq!(resolve_config_path(None, Some(" ".to_string())), PathBuf::from("friday.toml"));
        assert_eq!(resolve_config_path(None, None), PathBuf::from("friday.toml"));
    }

    #[test]
    fn test_port_flag_beats_env_beats_file() {
        let mut config = FridayConfig::default();
        config.api.port = 9000;

        apply_overrides(&mut config, None, None, None, None);
        assert_eq!(config.api.port, 9000);

        apply_overrides(&mut config, None, Some("9100".to_string()), None, None);
        assert_eq!(config.api.port, 9100);

        apply_overrides(&mut config, Some(9200), Some("9100".to_string()), None, None);
        assert_eq!(config.api.port, 9200);
    }

    #[test]
    fn test_invalid_port_env_is_ignored() {
        let mut config = FridayConfig::default();
        apply_overrides(&mut config, None, Some("eighty".to_string()), None, None);
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_data_dir_override() {
        let mut config = FridayConfig::default();
        apply_overrides(&mut config, None, None, None, Some("/srv/friday".to_string()));
        assert_eq!(config.general.data_dir, "/srv/friday");

        apply_overrides(
            &mut config,
            None,
            None,
            Some(PathBuf::from("/tmp/friday")),
            Some("/srv/friday".to_string()),
        );
        assert_eq!(config.general.data_dir, "/tmp/friday");
    }

    #[test]
    fn test_subcommands_parse() {
        let args = CliArgs::parse_from(["friday"]);
        assert_eq!(args.command(), Command::Serve);

        let args = CliArgs::parse_from(["friday", "chat", "what time is it?", "--session", "s1"]);
        assert_eq!(
            args.command(),
            Command::Chat {
                message: "what time is it?".to_string(),
                session: Some("s1".to_string()),
            }
        );

        let args = CliArgs::parse_from(["friday", "triggers", "--all", "--port", "9001"]);
        assert_eq!(args.command(), Command::Triggers { all: true });
        assert_eq!(args.port, Some(9001));
    }
}
