//! Application state wiring the turn orchestrator to concrete infrastructure.
//!
//! The orchestrator is generic over its message log; AppState pins it to
//! [`ServerLog`], which is SQLite in normal operation and in-memory for
//! `serve --ephemeral`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use tinker_core::chat::context::{ContextBuilder, ContextWindow};
use tinker_core::chat::orchestrator::{TurnOrchestrator, TurnSettings};
use tinker_core::chat::prompt::SYSTEM_PROMPT;
use tinker_core::chat::repository::MessageLog;
use tinker_core::llm::box_provider::BoxLlmProvider;
use tinker_infra::config::resolve_api_key;
use tinker_infra::llm::create_provider;
use tinker_infra::memory::InMemoryMessageLog;
use tinker_infra::sqlite::message_log::SqliteMessageLog;
use tinker_infra::sqlite::pool::{DatabasePool, database_url};
use tinker_types::chat::{ChatTurn, NewChatTurn};
use tinker_types::config::{AppConfig, LimitsConfig};
use tinker_types::error::RepositoryError;

/// The message log selected at startup.
pub enum ServerLog {
    Sqlite(SqliteMessageLog),
    Memory(InMemoryMessageLog),
}

impl MessageLog for ServerLog {
    async fn append(&self, turn: &NewChatTurn) -> Result<ChatTurn, RepositoryError> {
        match self {
            ServerLog::Sqlite(log) => log.append(turn).await,
            ServerLog::Memory(log) => log.append(turn).await,
        }
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<ChatTurn>, RepositoryError> {
        match self {
            ServerLog::Sqlite(log) => log.list_by_session(session_id).await,
            ServerLog::Memory(log) => log.list_by_session(session_id).await,
        }
    }
}

pub type ConcreteOrchestrator = TurnOrchestrator<ServerLog>;

/// Shared state of the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub limits: LimitsConfig,
}

impl AppState {
    pub fn new(orchestrator: ConcreteOrchestrator, limits: LimitsConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            limits,
        }
    }

    /// Resolve the provider credential, open the log, and wire the orchestrator.
    ///
    /// Fails when the API key variable is unset; the server never starts
    /// without a credential.
    pub async fn init(config: &AppConfig, data_dir: &Path, ephemeral: bool) -> anyhow::Result<Self> {
        let api_key = resolve_api_key(&config.provider).with_context(|| {
            format!(
                "no API key for provider '{}': set the {} environment variable",
                config.provider.name, config.provider.api_key_env
            )
        })?;
        let provider = create_provider(&config.provider, api_key)?;

        let log = if ephemeral {
            tracing::warn!("Ephemeral mode: conversations are kept in memory only");
            ServerLog::Memory(InMemoryMessageLog::new())
        } else {
            tokio::fs::create_dir_all(data_dir)
                .await
                .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
            let url = config
                .storage
                .database_url
                .clone()
                .unwrap_or_else(|| database_url(data_dir));
            let pool = DatabasePool::new(&url)
                .await
                .with_context(|| format!("failed to open database {url}"))?;
            ServerLog::Sqlite(SqliteMessageLog::new(pool))
        };

        Ok(Self::new(
            build_orchestrator(config, log, provider),
            config.limits.clone(),
        ))
    }
}

/// Wire an orchestrator from config; shared by startup and tests.
pub fn build_orchestrator(
    config: &AppConfig,
    log: ServerLog,
    provider: BoxLlmProvider,
) -> ConcreteOrchestrator {
    let window = ContextWindow {
        max_turns: config.context.max_turns,
    };
    TurnOrchestrator::new(
        log,
        provider,
        ContextBuilder::new(SYSTEM_PROMPT, window),
        TurnSettings::from_provider_settings(&config.provider),
    )
}
