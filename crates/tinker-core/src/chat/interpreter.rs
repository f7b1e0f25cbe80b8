//! Reply interpreter: untrusted provider text in, normalized reply out.
//!
//! [`interpret_reply`] is total. Anything that is not a well-formed reply
//! degrades to a plain text reply instead of failing the turn, and a
//! structured kind whose payload is unusable (a clarify without choices, a
//! video without id or title) degrades to text as well, so an assistant
//! turn's kind always matches its payload.
//!
//! [`render_reply`] is the inverse: it re-encodes a stored assistant turn in
//! the same grammar, so the provider sees its own prior decisions.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use tinker_types::chat::{
    AssistantReply, ChatTurn, ClarifyPayload, StructuredPayload, VideoPayload, VideoRef,
};

/// Spoken text used whenever the reply carries nothing usable.
pub const FALLBACK_REPLY: &str = "I'm not sure, but that sounds cool!";

/// Parse raw provider output into a normalized reply. Never fails.
pub fn interpret_reply(raw: &str) -> AssistantReply {
    let body = strip_code_fence(raw);

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, raw_len = raw.len(), "Provider reply is not JSON, falling back to text");
            return AssistantReply::text(FALLBACK_REPLY);
        }
    };

    let Some(obj) = value.as_object() else {
        debug!("Provider reply is not a JSON object, falling back to text");
        return AssistantReply::text(FALLBACK_REPLY);
    };

    let say = string_field(obj, &["say"]);
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .map(|t| t.trim().to_lowercase());

    match kind.as_deref() {
        Some("clarify") => interpret_clarify(obj, say),
        Some("video") => interpret_video(obj, say),
        Some("text") => text_reply(say),
        other => {
            debug!(reply_type = ?other, "Unrecognized reply type, treating as text");
            text_reply(say)
        }
    }
}

/// Re-encode a stored assistant turn in the provider's output grammar.
pub fn render_reply(turn: &ChatTurn) -> String {
    let say = turn.text.clone().unwrap_or_default();

    let value = match &turn.structured {
        Some(StructuredPayload::Clarify(clarify)) => json!({
            "type": "clarify",
            "say": say,
            "question": clarify.question,
            "choices": clarify.choices,
        }),
        Some(StructuredPayload::Video(video)) => json!({
            "type": "video",
            "say": say,
            "video": render_video(&video.primary),
            "alternates": video.alternates.iter().map(render_video).collect::<Vec<_>>(),
        }),
        None => json!({
            "type": "text",
            "say": say,
        }),
    };

    value.to_string()
}

fn interpret_clarify(obj: &Map<String, Value>, say: Option<String>) -> AssistantReply {
    let question = string_field(obj, &["question"]).unwrap_or_default();
    let choices: Vec<String> = obj
        .get("choices")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if choices.is_empty() {
        warn!("Clarify reply has no usable choices, degrading to text");
        let text = say
            .or_else(|| (!question.is_empty()).then(|| question.clone()))
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());
        return AssistantReply::text(text);
    }

    let text = say.unwrap_or_else(|| question.clone());
    AssistantReply {
        text,
        structured: Some(StructuredPayload::Clarify(ClarifyPayload { question, choices })),
    }
}

fn interpret_video(obj: &Map<String, Value>, say: Option<String>) -> AssistantReply {
    let primary = obj
        .get("video")
        .or_else(|| obj.get("primary"))
        .and_then(parse_video_ref);

    let Some(primary) = primary else {
        warn!("Video reply has no usable primary video, degrading to text");
        return text_reply(say);
    };

    let alternates = obj
        .get("alternates")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_video_ref).collect())
        .unwrap_or_default();

    let text = say.unwrap_or_else(|| primary.title.clone());
    AssistantReply {
        text,
        structured: Some(StructuredPayload::Video(VideoPayload {
            primary,
            alternates,
        })),
    }
}

fn text_reply(say: Option<String>) -> AssistantReply {
    AssistantReply::text(say.unwrap_or_else(|| FALLBACK_REPLY.to_string()))
}

/// A video reference needs a non-empty id and title; everything else is optional.
fn parse_video_ref(value: &Value) -> Option<VideoRef> {
    let obj = value.as_object()?;
    let id = string_field(obj, &["videoId", "id"])?;
    let title = string_field(obj, &["title"])?;

    let start_offset_seconds = ["startSeconds", "startOffsetSeconds"]
        .iter()
        .find_map(|key| obj.get(*key))
        .and_then(parse_seconds);

    Some(VideoRef {
        id,
        title,
        start_offset_seconds,
        rationale: string_field(obj, &["why", "rationale"]),
    })
}

fn parse_seconds(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value
        .as_f64()
        .filter(|n| n.is_finite() && *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n.floor() as u32)
}

fn render_video(video: &VideoRef) -> Value {
    let mut obj = Map::new();
    obj.insert("videoId".to_string(), json!(video.id));
    obj.insert("title".to_string(), json!(video.title));
    if let Some(start) = video.start_offset_seconds {
        obj.insert("startSeconds".to_string(), json!(start));
    }
    if let Some(why) = &video.rationale {
        obj.insert("why".to_string(), json!(why));
    }
    Value::Object(obj)
}

/// First non-blank string among `keys`, trimmed.
fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Strip a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tinker_types::chat::{NewChatTurn, TurnKind};

    #[test]
    fn test_clarify_reply() {
        let reply = interpret_reply(
            r#"{"type":"clarify","say":"What kind?","question":"What kind of robot?","choices":["Walking","Rolling","Arm"]}"#,
        );
        assert_eq!(reply.kind(), TurnKind::Clarify);
        assert_eq!(reply.text, "What kind?");
        let Some(StructuredPayload::Clarify(clarify)) = reply.structured else {
            panic!("expected clarify payload");
        };
        assert_eq!(clarify.question, "What kind of robot?");
        assert_eq!(clarify.choices, vec!["Walking", "Rolling", "Arm"]);
    }

    #[test]
    fn test_video_reply() {
        let reply = interpret_reply(
            r#"{"type":"video","say":"Here's a great tutorial!","video":{"videoId":"abc123","title":"Cardboard Robot"},"alternates":[]}"#,
        );
        assert_eq!(reply.kind(), TurnKind::Video);
        assert_eq!(reply.text, "Here's a great tutorial!");
        let Some(StructuredPayload::Video(video)) = reply.structured else {
            panic!("expected video payload");
        };
        assert_eq!(video.primary.id, "abc123");
        assert_eq!(video.primary.title, "Cardboard Robot");
        assert!(video.alternates.is_empty());
    }

    #[test]
    fn test_video_reply_optional_fields_and_missing_alternates() {
        let reply = interpret_reply(
            r#"{"type":"video","say":"Try this","video":{"id":"v1","title":"Paper plane","startSeconds":12.7,"why":"Short and easy"}}"#,
        );
        let Some(StructuredPayload::Video(video)) = reply.structured else {
            panic!("expected video payload");
        };
        assert_eq!(video.primary.id, "v1");
        assert_eq!(video.primary.start_offset_seconds, Some(12));
        assert_eq!(video.primary.rationale.as_deref(), Some("Short and easy"));
        assert!(video.alternates.is_empty());
    }

    #[test]
    fn test_malformed_alternates_are_skipped() {
        let reply = interpret_reply(
            r#"{"type":"video","video":{"videoId":"a","title":"A"},"alternates":[{"videoId":"b","title":"B"},{"title":"no id"},"junk",{"videoId":"c","title":"C","startSeconds":-4}]}"#,
        );
        let Some(StructuredPayload::Video(video)) = reply.structured else {
            panic!("expected video payload");
        };
        let ids: Vec<&str> = video.alternates.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(video.alternates[1].start_offset_seconds, None);
        // No "say": the primary title is spoken.
        assert_eq!(reply.text, "A");
    }

    #[test]
    fn test_not_json_falls_back() {
        let reply = interpret_reply("not json");
        assert_eq!(reply.kind(), TurnKind::Text);
        assert_eq!(reply.text, FALLBACK_REPLY);
        assert!(reply.structured.is_none());
    }

    #[test]
    fn test_malformed_inputs_always_yield_text() {
        let inputs = [
            "",
            "   ",
            "{",
            r#"{"type":"clarify","say":"trunc"#,
            "[1, 2, 3]",
            "42",
            "null",
            "\"just a string\"",
            "{}",
            r#"{"type":17}"#,
            "```json\n{\"type\": \n```",
        ];
        for input in inputs {
            let reply = interpret_reply(input);
            assert_eq!(reply.kind(), TurnKind::Text, "input: {input:?}");
            assert!(!reply.text.is_empty(), "input: {input:?}");
        }
    }

    #[test]
    fn test_unknown_type_is_text_with_say() {
        let reply = interpret_reply(r#"{"type":"story","say":"Once upon a time"}"#);
        assert_eq!(reply.kind(), TurnKind::Text);
        assert_eq!(reply.text, "Once upon a time");
    }

    #[test]
    fn test_clarify_without_choices_degrades_to_text() {
        let reply = interpret_reply(r#"{"type":"clarify","question":"Big or small?"}"#);
        assert_eq!(reply.kind(), TurnKind::Text);
        assert_eq!(reply.text, "Big or small?");

        let reply = interpret_reply(r#"{"type":"clarify","choices":[1, "", "  "]}"#);
        assert_eq!(reply.kind(), TurnKind::Text);
        assert_eq!(reply.text, FALLBACK_REPLY);
    }

    #[test]
    fn test_clarify_missing_question_uses_empty_default() {
        let reply = interpret_reply(r#"{"type":"clarify","say":"Pick one","choices":["A","B"]}"#);
        let Some(StructuredPayload::Clarify(clarify)) = reply.structured else {
            panic!("expected clarify payload");
        };
        assert_eq!(clarify.question, "");
        assert_eq!(clarify.choices.len(), 2);
    }

    #[test]
    fn test_video_without_primary_degrades_to_text() {
        let reply = interpret_reply(r#"{"type":"video","say":"Search for cardboard robots","video":{"videoId":"x"}}"#);
        assert_eq!(reply.kind(), TurnKind::Text);
        assert_eq!(reply.text, "Search for cardboard robots");
    }

    #[test]
    fn test_code_fenced_json_is_accepted() {
        let reply = interpret_reply("```json\n{\"type\":\"text\",\"say\":\"Hello maker!\"}\n```");
        assert_eq!(reply.text, "Hello maker!");
    }

    #[test]
    fn test_type_is_case_insensitive() {
        let reply = interpret_reply(r#"{"type":" Clarify ","choices":["Yes","No"]}"#);
        assert_eq!(reply.kind(), TurnKind::Clarify);
    }

    #[test]
    fn test_render_reply_reads_back_as_the_same_decision() {
        let replies = [
            r#"{"type":"clarify","say":"What kind?","question":"What kind of robot?","choices":["Walking","Rolling"]}"#,
            r#"{"type":"video","say":"Watch!","video":{"videoId":"abc","title":"Robot","startSeconds":5,"why":"fun"},"alternates":[{"videoId":"def","title":"Other"}]}"#,
            r#"{"type":"text","say":"Have fun!"}"#,
        ];
        for raw in replies {
            let reply = interpret_reply(raw);
            let turn = NewChatTurn::assistant("s", reply.clone()).into_turn(1, Utc::now());
            let rendered = render_reply(&turn);
            assert_eq!(interpret_reply(&rendered), reply, "raw: {raw}");
        }
    }

    #[test]
    fn test_render_video_uses_provider_field_names() {
        let reply = interpret_reply(
            r#"{"type":"video","say":"Go","video":{"videoId":"abc","title":"Robot"}}"#,
        );
        let turn = NewChatTurn::assistant("s", reply).into_turn(1, Utc::now());
        let rendered: Value = serde_json::from_str(&render_reply(&turn)).unwrap();
        assert_eq!(rendered["type"], "video");
        assert_eq!(rendered["video"]["videoId"], "abc");
        assert!(rendered["video"].get("startSeconds").is_none());
        assert_eq!(rendered["alternates"], json!([]));
    }
}
