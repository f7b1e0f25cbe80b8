//! Prompt context assembly.
//!
//! Turns a session's stored history into the ordered message list sent to the
//! provider: the system instruction first, then each turn in log order.

use tinker_types::chat::{ChatTurn, TurnRole};
use tinker_types::error::RepositoryError;
use tinker_types::llm::{ContentPart, MessageRole, PromptTurn};

use super::interpreter::render_reply;
use super::repository::MessageLog;

/// How much history is replayed to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextWindow {
    /// Keep only the most recent N turns. `None` (or 0) replays everything.
    pub max_turns: Option<usize>,
}

impl ContextWindow {
    pub fn unbounded() -> Self {
        Self { max_turns: None }
    }

    pub fn last(max_turns: usize) -> Self {
        Self {
            max_turns: Some(max_turns),
        }
    }

    /// Select the suffix of `turns` to replay.
    ///
    /// A truncated window never starts on an assistant turn, so the provider
    /// does not see a reply without the message that prompted it.
    pub fn apply<'a>(&self, turns: &'a [ChatTurn]) -> &'a [ChatTurn] {
        let Some(max) = self.max_turns.filter(|n| *n > 0) else {
            return turns;
        };
        if turns.len() <= max {
            return turns;
        }

        let mut start = turns.len() - max;
        while start < turns.len() && turns[start].role != TurnRole::User {
            start += 1;
        }
        &turns[start..]
    }
}

/// Builds provider prompts from stored turns.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    window: ContextWindow,
}

impl ContextBuilder {
    pub fn new(system_prompt: impl Into<String>, window: ContextWindow) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            window,
        }
    }

    pub fn window(&self) -> ContextWindow {
        self.window
    }

    /// Build the message list for `turns`, which must be in log order.
    pub fn build(&self, turns: &[ChatTurn]) -> Vec<PromptTurn> {
        let replayed = self.window.apply(turns);

        let mut messages = Vec::with_capacity(replayed.len() + 1);
        messages.push(PromptTurn::text(MessageRole::System, self.system_prompt.clone()));
        messages.extend(replayed.iter().map(prompt_turn));
        messages
    }

    /// Read a session's history from `log` and build its prompt.
    pub async fn build_for_session<L: MessageLog>(
        &self,
        log: &L,
        session_id: &str,
    ) -> Result<Vec<PromptTurn>, RepositoryError> {
        let turns = log.list_by_session(session_id).await?;
        Ok(self.build(&turns))
    }
}

fn prompt_turn(turn: &ChatTurn) -> PromptTurn {
    match turn.role {
        TurnRole::User => {
            let mut content = Vec::with_capacity(2);
            if let Some(text) = turn.text.as_deref().filter(|t| !t.is_empty()) {
                content.push(ContentPart::Text {
                    text: text.to_string(),
                });
            }
            if let Some(url) = &turn.image_ref {
                content.push(ContentPart::ImageUrl { url: url.clone() });
            }
            PromptTurn {
                role: MessageRole::User,
                content,
            }
        }
        TurnRole::Assistant => PromptTurn::text(MessageRole::Assistant, render_reply(turn)),
    }
}
