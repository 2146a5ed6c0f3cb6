pub mod config;
pub mod error;

pub use config::{
    ApiConfig, ChatConfig, FridayConfig, GeneralConfig, LlmConfig, NotesConfig, TelegramConfig,
    TriggerConfig,
};
pub use error::{FridayError, Result};
