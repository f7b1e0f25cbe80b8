//! In-process message log.
//!
//! Backs `tinker serve --ephemeral`. Nothing survives a restart.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use tinker_core::chat::repository::MessageLog;
use tinker_types::chat::{ChatTurn, NewChatTurn};
use tinker_types::error::RepositoryError;

#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    turns: RwLock<Vec<ChatTurn>>,
    next_id: AtomicI64,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageLog for InMemoryMessageLog {
    async fn append(&self, turn: &NewChatTurn) -> Result<ChatTurn, RepositoryError> {
        let mut turns = self.turns.write().await;
        // Id and timestamp are assigned under the write lock so log order matches both.
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let stored = turn.clone().into_turn(id, Utc::now());
        turns.push(stored.clone());
        Ok(stored)
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<ChatTurn>, RepositoryError> {
        let turns = self.turns.read().await;
        Ok(turns
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect())
    }
}
