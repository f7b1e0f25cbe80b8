//! Turn orchestrator: drives one conversation turn end to end.
//!
//! persist user turn -> build context -> call provider -> interpret reply ->
//! persist assistant turn. A failure after the user turn is written leaves it
//! in the log; nothing is rolled back or retried here.
//!
//! Turns of the same session are serialized so each one sees the complete
//! history of the turns before it. Different sessions run concurrently.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

use tinker_types::chat::{ChatTurn, NewChatTurn};
use tinker_types::config::ProviderSettings;
use tinker_types::error::TurnError;
use tinker_types::llm::{CompletionRequest, LlmError};

use super::context::ContextBuilder;
use super::interpreter::interpret_reply;
use super::repository::MessageLog;
use crate::llm::box_provider::BoxLlmProvider;

/// Per-turn request parameters.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    /// Upper bound on the provider call.
    pub timeout: Duration,
}

impl TurnSettings {
    pub fn from_provider_settings(settings: &ProviderSettings) -> Self {
        Self {
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: Some(settings.temperature),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from_provider_settings(&ProviderSettings::default())
    }
}

/// Progress of a single turn. Reported when a turn fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Idle,
    UserPersisted,
    ContextBuilt,
    ProviderCalled,
    ReplyInterpreted,
    AssistantPersisted,
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnStage::Idle => "idle",
            TurnStage::UserPersisted => "user_persisted",
            TurnStage::ContextBuilt => "context_built",
            TurnStage::ProviderCalled => "provider_called",
            TurnStage::ReplyInterpreted => "reply_interpreted",
            TurnStage::AssistantPersisted => "assistant_persisted",
        };
        f.write_str(s)
    }
}

type SessionLocks = DashMap<String, Arc<Mutex<()>>>;

/// Coordinates the message log, context builder, provider, and interpreter.
pub struct TurnOrchestrator<L: MessageLog> {
    log: L,
    provider: BoxLlmProvider,
    context: ContextBuilder,
    settings: TurnSettings,
    session_locks: SessionLocks,
}

impl<L: MessageLog> TurnOrchestrator<L> {
    pub fn new(
        log: L,
        provider: BoxLlmProvider,
        context: ContextBuilder,
        settings: TurnSettings,
    ) -> Self {
        Self {
            log,
            provider,
            context,
            settings,
            session_locks: DashMap::new(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one turn and return the persisted assistant turn.
    ///
    /// Empty submissions (no text, no image) are passed through to the
    /// provider like any other turn.
    pub async fn submit_turn(
        &self,
        session_id: &str,
        text: Option<String>,
        image_ref: Option<String>,
    ) -> Result<ChatTurn, TurnError> {
        let span = info_span!("turn", session_id = %session_id);

        async {
            let slot = SessionSlot::acquire(&self.session_locks, session_id);
            let _guard = slot.lock().lock().await;

            let started = Instant::now();
            let mut stage = TurnStage::Idle;
            let result = self.drive(session_id, text, image_ref, &mut stage).await;

            match &result {
                Ok(turn) => info!(
                    turn_id = turn.id,
                    kind = %turn.kind,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Turn completed"
                ),
                Err(e) => warn!(
                    stage = %stage,
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Turn failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// All turns of a session in log order.
    pub async fn history(&self, session_id: &str) -> Result<Vec<ChatTurn>, TurnError> {
        Ok(self.log.list_by_session(session_id).await?)
    }

    async fn drive(
        &self,
        session_id: &str,
        text: Option<String>,
        image_ref: Option<String>,
        stage: &mut TurnStage,
    ) -> Result<ChatTurn, TurnError> {
        let has_text = text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if !has_text && image_ref.is_none() {
            warn!("Empty submission, passing through to provider");
        }

        let user_turn = self
            .log
            .append(&NewChatTurn::user(session_id, text, image_ref))
            .await?;
        *stage = TurnStage::UserPersisted;
        debug!(stage = %stage, turn_id = user_turn.id, "User turn persisted");

        let messages = self
            .context
            .build_for_session(&self.log, session_id)
            .await?;
        *stage = TurnStage::ContextBuilt;
        debug!(stage = %stage, messages = messages.len(), "Context built");

        let request = CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            json_output: true,
        };
        let raw = self.call_provider(&request).await?;
        *stage = TurnStage::ProviderCalled;
        debug!(stage = %stage, reply_len = raw.len(), "Provider replied");

        let reply = interpret_reply(&raw);
        *stage = TurnStage::ReplyInterpreted;
        debug!(stage = %stage, kind = %reply.kind(), "Reply interpreted");

        let assistant_turn = self
            .log
            .append(&NewChatTurn::assistant(session_id, reply))
            .await?;
        *stage = TurnStage::AssistantPersisted;
        debug!(stage = %stage, turn_id = assistant_turn.id, "Assistant turn persisted");

        Ok(assistant_turn)
    }

    async fn call_provider(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let span = info_span!(
            "gen_ai.complete",
            gen_ai.system = self.provider.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
        );

        let timeout = self.settings.timeout;
        let response = tokio::time::timeout(timeout, self.provider.complete(request).instrument(span))
            .await
            .map_err(|_| LlmError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })??;

        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = %response.stop_reason,
            "Completion received"
        );
        Ok(response.content)
    }
}

/// A claim on a session's lock entry. Dropping the last claim removes the
/// entry, so idle sessions do not accumulate in the map.
struct SessionSlot<'a> {
    locks: &'a SessionLocks,
    session_id: &'a str,
    lock: Option<Arc<Mutex<()>>>,
}

impl<'a> SessionSlot<'a> {
    fn acquire(locks: &'a SessionLocks, session_id: &'a str) -> Self {
        let lock = Arc::clone(locks.entry(session_id.to_string()).or_default().value());
        Self {
            locks,
            session_id,
            lock: Some(lock),
        }
    }

    fn lock(&self) -> &Mutex<()> {
        self.lock
            .as_deref()
            .unwrap_or_else(|| unreachable!("lock is only taken on drop"))
    }
}

impl Drop for SessionSlot<'_> {
    fn drop(&mut self) {
        self.lock.take();
        self.locks
            .remove_if(self.session_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
