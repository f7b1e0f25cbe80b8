//! Conversation HTTP handlers.
//!
//! Endpoints:
//! - GET  /sessions/{sessionId}/messages - Full turn log of a session
//! - POST /messages                      - Submit a user turn, get the assistant turn

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use uuid::Uuid;

use tinker_infra::image::normalize_image_ref;
use tinker_types::chat::{ChatTurn, SubmitTurnRequest};

use crate::http::error::AppError;
use crate::state::AppState;

/// Longest accepted session id, in characters.
pub const MAX_SESSION_ID_CHARS: usize = 256;

fn validate_session_id(session_id: &str) -> Result<(), AppError> {
    if session_id.trim().is_empty() {
        return Err(AppError::Validation("sessionId is required".to_string()));
    }
    if session_id.chars().count() > MAX_SESSION_ID_CHARS {
        return Err(AppError::Validation(format!(
            "sessionId must be at most {MAX_SESSION_ID_CHARS} characters"
        )));
    }
    Ok(())
}

/// GET /sessions/{sessionId}/messages
///
/// An unknown session is an empty list, never a 404.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChatTurn>>, AppError> {
    validate_session_id(&session_id)?;
    let turns = state.orchestrator.history(&session_id).await?;
    tracing::debug!(session_id = %session_id, turns = turns.len(), "Listed session turns");
    Ok(Json(turns))
}

/// POST /messages
///
/// The turn runs on its own task: once accepted it completes and persists
/// even if the client disconnects before the reply is sent.
pub async fn submit_message(
    State(state): State<AppState>,
    payload: Result<Json<SubmitTurnRequest>, JsonRejection>,
) -> Result<Json<ChatTurn>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let Json(request) = payload?;
    validate_session_id(&request.session_id)?;

    let image_ref = request
        .image
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| normalize_image_ref(raw, state.limits.max_image_bytes))
        .transpose()?;
    let text = request.text.filter(|t| !t.trim().is_empty());

    tracing::info!(
        request_id = %request_id,
        session_id = %request.session_id,
        has_text = text.is_some(),
        has_image = image_ref.is_some(),
        "Submitting turn"
    );

    let orchestrator = Arc::clone(&state.orchestrator);
    let session_id = request.session_id;
    let turn = tokio::spawn(async move {
        orchestrator.submit_turn(&session_id, text, image_ref).await
    })
    .await
    .map_err(|e| AppError::Internal(format!("turn task failed: {e}")))??;

    tracing::info!(
        request_id = %request_id,
        turn_id = turn.id,
        kind = %turn.kind,
        response_ms = start.elapsed().as_millis() as u64,
        "Turn answered"
    );
    Ok(Json(turn))
}
