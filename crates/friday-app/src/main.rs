//! Friday application binary - composition root.
//!
//! Builds every component once and wires them together:
//! 1. Load configuration from TOML and apply CLI/env overrides
//! 2. Open the trigger, task and conversation stores
//! 3. Build the chat pipeline (completion client, classifier, handlers)
//! 4. Start the trigger scheduler and the axum API server
//!
//! On Ctrl-C the server stops accepting requests, then the scheduler is told
//! to stop and awaited so an in-flight tick completes.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use friday_action::{
    LogNotifier, Notifier, TelegramNotifier, TodoStore, TriggerFilter, TriggerScheduler,
    TriggerStatus, TriggerStore,
};
use friday_api::AppState;
use friday_chat::{
    ChatOrchestrator, Completion, HandlerRegistry, IntentClassifier, KnowledgeBase, MemoryStore,
    OpenAiCompletion, Services, SqliteConversationStore, SqliteMemoryStore, VaultNoteStore,
};
use friday_core::config::FridayConfig;
use friday_core::error::{FridayError, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::cli::{CliArgs, Command};

/// Long-lived components shared by the server and the one-shot commands.
struct Components {
    triggers: Arc<TriggerStore>,
    orchestrator: Arc<ChatOrchestrator>,
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the subscriber. RUST_LOG wins outright; otherwise the filter can be
/// swapped once the config file has been read.
fn init_tracing(level: &str) -> Option<FilterHandle> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        return None;
    }
    let (filter, handle) = reload::Layer::new(EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    Some(handle)
}

fn open_triggers(config: &FridayConfig) -> Result<Arc<TriggerStore>> {
    let tz = config.general.timezone()?;
    let store = TriggerStore::open(config.triggers_path(), config.triggers.clone(), tz)?;
    Ok(Arc::new(store))
}

fn build_components(config: &FridayConfig) -> Result<Components> {
    std::fs::create_dir_all(config.data_dir())?;

    let triggers = open_triggers(config)?;
    let todos = Arc::new(TodoStore::open(config.todos_path())?);
    let conversations = Arc::new(SqliteConversationStore::open(&config.conversations_path())?);
    let memory = SqliteMemoryStore::open(&config.memories_path())
        .map_err(|e| FridayError::Storage(e.to_string()))?;
    let vault = Arc::new(VaultNoteStore::new(config.vault_dir()));
    tracing::info!(path = %config.vault_dir().display(), "Notes vault ready");

    let completion: Arc<dyn Completion> = Arc::new(OpenAiCompletion::from_config(&config.llm)?);
    tracing::info!(
        base_url = %config.llm.base_url,
        model = %config.llm.model,
        "Completion endpoint configured"
    );

    let services = Services {
        triggers: triggers.clone(),
        todos,
        notes: vault.clone(),
        default_folder: config.notes.default_folder.clone(),
        knowledge: Some(vault as Arc<dyn KnowledgeBase>),
        calendar: None,
        web: None,
        health: None,
        memory: Some(Arc::new(memory) as Arc<dyn MemoryStore>),
    };
    let registry = HandlerRegistry::with_builtin_handlers(services);
    tracing::debug!(actions = ?registry.actions(), "Handlers registered");

    let orchestrator = ChatOrchestrator::new(
        IntentClassifier::new(
            completion.clone(),
            Duration::from_secs(config.llm.classifier_timeout_secs),
        ),
        registry,
        conversations,
        completion,
        config.chat.clone(),
        Duration::from_secs(config.llm.timeout_secs),
    );

    Ok(Components {
        triggers,
        orchestrator: Arc::new(orchestrator),
    })
}

/// Telegram when configured, otherwise the log.
fn build_notifier(config: &FridayConfig) -> Result<Arc<dyn Notifier>> {
    if config.telegram.is_configured() {
        let timeout = Duration::from_secs(config.triggers.send_timeout_secs);
        let notifier = TelegramNotifier::from_config(&config.telegram, timeout)?;
        tracing::info!("Delivering notifications through Telegram");
        return Ok(Arc::new(notifier));
    }
    tracing::info!("Telegram not configured, notifications go to the log");
    Ok(Arc::new(LogNotifier::new()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown requested");
}

async fn serve(config: FridayConfig) -> Result<()> {
    let components = build_components(&config)?;
    let notifier = build_notifier(&config)?;

    let scheduler = Arc::new(TriggerScheduler::new(components.triggers.clone(), notifier));
    let scheduler_task = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run().await }
    });

    let state = AppState::new(config, components.orchestrator, components.triggers);
    let served = friday_api::start_server(state, shutdown_signal()).await;

    scheduler.shutdown();
    if let Err(e) = scheduler_task.await {
        tracing::error!(error = %e, "Trigger scheduler task failed");
    }
    served
}

async fn chat_once(config: FridayConfig, message: String, session: Option<String>) -> Result<()> {
    let components = build_components(&config)?;
    let response = components
        .orchestrator
        .handle(session.as_deref(), &message)
        .await;
    println!("{}", response.answer);
    if session.is_none() {
        eprintln!("(session {})", response.session_id);
    }
    Ok(())
}

async fn print_triggers(config: FridayConfig, all: bool) -> Result<()> {
    let tz = config.general.timezone()?;
    let store = open_triggers(&config)?;
    let filter = TriggerFilter {
        status: (!all).then_some(TriggerStatus::Pending),
        kind: None,
    };
    let triggers = store.list(filter).await;
    if triggers.is_empty() {
        println!("No triggers.");
        return Ok(());
    }
    for t in triggers {
        let mut line = format!(
            "{}  {:<9} {:<8} {}  {}",
            t.short_id(),
            t.status.to_string(),
            t.kind.to_string(),
            t.remind_at.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
            t.message
        );
        if let Some(pattern) = t.recurring_pattern {
            line.push_str(&format!(" (every {})", pattern));
        }
        if let Some(condition) = &t.condition {
            line.push_str(&format!(" (when {})", condition));
        }
        println!("{}", line);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let filter = init_tracing(args.log_level.as_deref().unwrap_or("info"));
    tracing::info!("Starting Friday v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.resolve_config_path();
    let mut config = FridayConfig::load_or_default(&config_path);
    args.apply_overrides(&mut config);

    if let (Some(handle), None) = (&filter, &args.log_level) {
        if let Err(e) = handle.reload(EnvFilter::new(&config.general.log_level)) {
            tracing::warn!(error = %e, "Failed to apply configured log level");
        }
    }

    match args.command() {
        Command::Serve => serve(config).await?,
        Command::Chat { message, session } => chat_once(config, message, session).await?,
        Command::Triggers { all } => print_triggers(config, all).await?,
    }
    Ok(())
}
