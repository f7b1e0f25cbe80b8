//! MessageLog trait definition.
//!
//! The append-only, session-partitioned store of chat turns. Follows the same
//! RPITIT pattern as `LlmProvider`.

use std::sync::Arc;

use tinker_types::chat::{ChatTurn, NewChatTurn};
use tinker_types::error::RepositoryError;

/// Repository trait for the per-session turn log.
///
/// Implementations live in tinker-infra (e.g., `SqliteMessageLog`).
/// Turns are never updated or deleted once appended.
pub trait MessageLog: Send + Sync {
    /// Append a turn, assigning its id and creation timestamp.
    ///
    /// The write is atomic: the turn is either fully visible to subsequent
    /// reads of the session or not at all.
    fn append(
        &self,
        turn: &NewChatTurn,
    ) -> impl std::future::Future<Output = Result<ChatTurn, RepositoryError>> + Send;

    /// All turns of a session, ascending by `(created_at, id)`.
    ///
    /// An unknown session yields an empty list, not an error.
    fn list_by_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ChatTurn>, RepositoryError>> + Send;
}

impl<T: MessageLog> MessageLog for Arc<T> {
    fn append(
        &self,
        turn: &NewChatTurn,
    ) -> impl std::future::Future<Output = Result<ChatTurn, RepositoryError>> + Send {
        (**self).append(turn)
    }

    fn list_by_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ChatTurn>, RepositoryError>> + Send {
        (**self).list_by_session(session_id)
    }
}
