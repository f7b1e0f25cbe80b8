//! Chat turn and structured payload types for Tinker.
//!
//! A session is an ordered, append-only log of [`ChatTurn`]s. User turns carry
//! free text and an optional image; assistant turns carry the interpreted reply
//! of the provider: plain text, a clarifying question, or a video recommendation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            other => Err(format!("invalid turn role: '{other}'")),
        }
    }
}

/// Semantic type of a turn's payload.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (kind IN ('text', 'clarify', 'video'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Text,
    Clarify,
    Video,
}

impl fmt::Display for TurnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnKind::Text => write!(f, "text"),
            TurnKind::Clarify => write!(f, "clarify"),
            TurnKind::Video => write!(f, "video"),
        }
    }
}

impl FromStr for TurnKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(TurnKind::Text),
            "clarify" => Ok(TurnKind::Clarify),
            "video" => Ok(TurnKind::Video),
            other => Err(format!("invalid turn kind: '{other}'")),
        }
    }
}

/// A reference to a recommended video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    /// Provider-specific video identifier (e.g. a YouTube video id).
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset_seconds: Option<u32>,
    /// Why this video was picked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// A clarifying multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyPayload {
    pub question: String,
    pub choices: Vec<String>,
}

/// A recommended video with ordered alternates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoPayload {
    pub primary: VideoRef,
    #[serde(default)]
    pub alternates: Vec<VideoRef>,
}

/// Kind-specific data carried by an assistant turn.
///
/// Text turns carry no structured payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StructuredPayload {
    Clarify(ClarifyPayload),
    Video(VideoPayload),
}

impl StructuredPayload {
    /// The turn kind this payload belongs to.
    pub fn kind(&self) -> TurnKind {
        match self {
            StructuredPayload::Clarify(_) => TurnKind::Clarify,
            StructuredPayload::Video(_) => TurnKind::Video,
        }
    }
}

/// A normalized assistant reply, as produced by the reply interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    /// Human-readable message spoken to the user, regardless of kind.
    pub text: String,
    pub structured: Option<StructuredPayload>,
}

impl AssistantReply {
    /// A plain text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured: None,
        }
    }

    /// Kind derived from the payload; no payload means text.
    pub fn kind(&self) -> TurnKind {
        self.structured
            .as_ref()
            .map(StructuredPayload::kind)
            .unwrap_or(TurnKind::Text)
    }
}

/// One persisted entry in a session's log.
///
/// Turns are ordered by `(created_at, id)` within a session and are never
/// updated after write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub id: i64,
    pub session_id: String,
    pub role: TurnRole,
    pub kind: TurnKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image data URL or http(s) URL (user turns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredPayload>,
    pub created_at: DateTime<Utc>,
}

/// A turn that has not been written yet. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChatTurn {
    pub session_id: String,
    pub role: TurnRole,
    pub kind: TurnKind,
    pub text: Option<String>,
    pub image_ref: Option<String>,
    pub structured: Option<StructuredPayload>,
}

impl NewChatTurn {
    /// A user turn. Either part may be absent; an empty turn is still legal.
    pub fn user(session_id: impl Into<String>, text: Option<String>, image_ref: Option<String>) -> Self {
        Self {
            session_id: session_id.into(),
            role: TurnRole::User,
            kind: TurnKind::Text,
            text,
            image_ref,
            structured: None,
        }
    }

    /// An assistant turn whose kind is derived from the reply's payload.
    pub fn assistant(session_id: impl Into<String>, reply: AssistantReply) -> Self {
        Self {
            session_id: session_id.into(),
            role: TurnRole::Assistant,
            kind: reply.kind(),
            text: Some(reply.text),
            image_ref: None,
            structured: reply.structured,
        }
    }

    /// Attach the store-assigned identity.
    pub fn into_turn(self, id: i64, created_at: DateTime<Utc>) -> ChatTurn {
        ChatTurn {
            id,
            session_id: self.session_id,
            role: self.role,
            kind: self.kind,
            text: self.text,
            image_ref: self.image_ref,
            structured: self.structured,
            created_at,
        }
    }
}

/// Body of `POST /messages`.
///
/// `session_id` defaults to empty so a missing field is reported by request
/// validation rather than by the JSON decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTurnRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Data URL, http(s) URL, or bare base64 image bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str) -> VideoRef {
        VideoRef {
            id: id.to_string(),
            title: format!("Video {id}"),
            start_offset_seconds: None,
            rationale: None,
        }
    }

    #[test]
    fn test_turn_kind_roundtrip() {
        for kind in [TurnKind::Text, TurnKind::Clarify, TurnKind::Video] {
            let parsed: TurnKind = kind.to_string().parse().unwrap();
            assert_eq!(kind, parsed);
        }
        assert!("story".parse::<TurnKind>().is_err());
    }

    #[test]
    fn test_turn_role_from_str_case_insensitive() {
        assert_eq!("Assistant".parse::<TurnRole>().unwrap(), TurnRole::Assistant);
        assert!("system".parse::<TurnRole>().is_err());
    }

    #[test]
    fn test_structured_payload_tagged_serde() {
        let payload = StructuredPayload::Clarify(ClarifyPayload {
            question: "What kind of robot?".to_string(),
            choices: vec!["Walking".to_string(), "Rolling".to_string()],
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "clarify");
        assert_eq!(json["choices"][1], "Rolling");

        let parsed: StructuredPayload = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_video_ref_camel_case_and_optional_fields() {
        let json = serde_json::to_value(VideoRef {
            start_offset_seconds: Some(42),
            ..video("abc123")
        })
        .unwrap();
        assert_eq!(json["startOffsetSeconds"], 42);
        assert!(json.get("rationale").is_none());
    }

    #[test]
    fn test_assistant_turn_kind_follows_payload() {
        let reply = AssistantReply {
            text: "Here's a great tutorial!".to_string(),
            structured: Some(StructuredPayload::Video(VideoPayload {
                primary: video("abc123"),
                alternates: vec![],
            })),
        };
        let turn = NewChatTurn::assistant("s1", reply);
        assert_eq!(turn.kind, TurnKind::Video);
        assert_eq!(turn.role, TurnRole::Assistant);

        let plain = NewChatTurn::assistant("s1", AssistantReply::text("hi"));
        assert_eq!(plain.kind, TurnKind::Text);
        assert!(plain.structured.is_none());
    }

    #[test]
    fn test_chat_turn_serialize_skips_absent_fields() {
        let turn = NewChatTurn::user("s1", Some("I want to build a robot".to_string()), None)
            .into_turn(7, Utc::now());
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["role"], "user");
        assert_eq!(json["kind"], "text");
        assert!(json.get("imageRef").is_none());
        assert!(json.get("structured").is_none());
    }

    #[test]
    fn test_submit_turn_request_missing_fields_default() {
        let req: SubmitTurnRequest = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(req.session_id, "");
        assert_eq!(req.text.as_deref(), Some("hi"));
        assert!(req.image.is_none());

        let req: SubmitTurnRequest =
            serde_json::from_str(r#"{"sessionId":"abc","image":"https://x/y.png"}"#).unwrap();
        assert_eq!(req.session_id, "abc");
        assert!(serde_json::from_str::<SubmitTurnRequest>(r#"{"sessionId":"a","text":5}"#).is_err());
    }
}
