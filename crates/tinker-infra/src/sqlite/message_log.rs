//! SQLite message log implementation.
//!
//! Implements `MessageLog` from `tinker-core` using sqlx with split
//! read/write pools: raw queries, a private Row struct, writes on the writer
//! pool and reads on the reader pool.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use tinker_core::chat::repository::MessageLog;
use tinker_types::chat::{ChatTurn, NewChatTurn, StructuredPayload, TurnKind, TurnRole};
use tinker_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MessageLog`.
pub struct SqliteMessageLog {
    pool: DatabasePool,
}

impl SqliteMessageLog {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain ChatTurn.
struct ChatTurnRow {
    id: i64,
    session_id: String,
    role: String,
    kind: String,
    text: Option<String>,
    image_ref: Option<String>,
    structured: Option<String>,
    created_at: String,
}

impl ChatTurnRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            kind: row.try_get("kind")?,
            text: row.try_get("text")?,
            image_ref: row.try_get("image_ref")?,
            structured: row.try_get("structured")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_turn(self) -> Result<ChatTurn, RepositoryError> {
        let role: TurnRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let kind: TurnKind = self
            .kind
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let structured = self
            .structured
            .as_deref()
            .map(serde_json::from_str::<StructuredPayload>)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid structured payload: {e}")))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(ChatTurn {
            id: self.id,
            session_id: self.session_id,
            role,
            kind,
            text: self.text,
            image_ref: self.image_ref,
            structured,
            created_at,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width so that lexical order in SQLite equals time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl MessageLog for SqliteMessageLog {
    async fn append(&self, turn: &NewChatTurn) -> Result<ChatTurn, RepositoryError> {
        let structured = turn
            .structured
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("failed to encode structured payload: {e}")))?;

        // Truncate to the stored precision so the returned turn equals a later read.
        let created_at = parse_datetime(&format_datetime(&Utc::now()))?;

        let row = sqlx::query(
            r#"INSERT INTO chat_turns (session_id, role, kind, text, image_ref, structured, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(&turn.session_id)
        .bind(turn.role.to_string())
        .bind(turn.kind.to_string())
        .bind(&turn.text)
        .bind(&turn.image_ref)
        .bind(structured)
        .bind(format_datetime(&created_at))
        .fetch_one(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tracing::debug!(
            turn_id = id,
            session_id = %turn.session_id,
            role = %turn.role,
            kind = %turn.kind,
            "Appended chat turn"
        );

        Ok(turn.clone().into_turn(id, created_at))
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<ChatTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_turns WHERE session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ChatTurnRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_turn()
            })
            .collect()
    }
}
