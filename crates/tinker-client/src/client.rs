//! `ChatClient`: cached session history plus turn submission.

use dashmap::DashMap;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use tinker_types::chat::{ChatTurn, SubmitTurnRequest};

use crate::error::ClientError;

/// Client for one Tinker server.
///
/// History is cached per session until a send for that session succeeds or
/// [`ChatClient::invalidate`] is called. Cached copies are never merged with
/// send results; the next read goes back to the server.
pub struct ChatClient {
    http: reqwest::Client,
    base_url: Url,
    cache: DashMap<String, Vec<ChatTurn>>,
    /// Bumped on every invalidation; a read started under an older
    /// generation does not repopulate the cache.
    generations: DashMap<String, u64>,
    pending: DashMap<String, usize>,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    pub fn with_http_client(base_url: &str, http: reqwest::Client) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url,
            cache: DashMap::new(),
            generations: DashMap::new(),
            pending: DashMap::new(),
        })
    }

    /// Session history, from the cache when present.
    ///
    /// An unknown session is an empty history.
    pub async fn fetch_history(&self, session_id: &str) -> Result<Vec<ChatTurn>, ClientError> {
        if let Some(cached) = self.cache.get(session_id) {
            tracing::debug!(session_id, turns = cached.len(), "History served from cache");
            return Ok(cached.clone());
        }
        self.refresh_history(session_id).await
    }

    /// Session history, always read from the server. Replaces the cached copy
    /// unless the session was invalidated while the read was in flight.
    pub async fn refresh_history(&self, session_id: &str) -> Result<Vec<ChatTurn>, ClientError> {
        let generation = self.generation(session_id);
        let url = self.endpoint(&["sessions", session_id, "messages"])?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let turns = if response.status() == StatusCode::NOT_FOUND {
            Vec::new()
        } else {
            decode::<Vec<ChatTurn>>(response).await?
        };

        tracing::debug!(session_id, turns = turns.len(), "History fetched");
        let current = self.generations.entry(session_id.to_string()).or_insert(0);
        if *current == generation {
            self.cache.insert(session_id.to_string(), turns.clone());
        } else {
            tracing::debug!(session_id, "Session invalidated during fetch, not caching");
        }
        Ok(turns)
    }

    /// Submit one turn and return the assistant's reply.
    ///
    /// On success the session's cached history is dropped. On failure it is
    /// left as is; the server may still have persisted the user turn.
    pub async fn send_turn(
        &self,
        session_id: &str,
        text: Option<String>,
        image: Option<String>,
    ) -> Result<ChatTurn, ClientError> {
        let _pending = PendingGuard::new(&self.pending, session_id);

        let url = self.endpoint(&["messages"])?;
        let body = SubmitTurnRequest {
            session_id: session_id.to_string(),
            text,
            image,
        };
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let turn = decode::<ChatTurn>(response).await?;
        self.invalidate(session_id);
        Ok(turn)
    }

    /// Drop the cached history of one session.
    pub fn invalidate(&self, session_id: &str) {
        let mut generation = self.generations.entry(session_id.to_string()).or_insert(0);
        *generation += 1;
        self.cache.remove(session_id);
    }

    /// Whether a send for this session is outstanding.
    pub fn is_pending(&self, session_id: &str) -> bool {
        self.pending.get(session_id).is_some_and(|count| *count > 0)
    }

    fn generation(&self, session_id: &str) -> u64 {
        self.generations.get(session_id).map_or(0, |g| *g)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }
    response.json::<T>().await.map_err(ClientError::Decode)
}

/// Marks a session as having a send in flight until dropped.
struct PendingGuard<'a> {
    pending: &'a DashMap<String, usize>,
    session_id: String,
}

impl<'a> PendingGuard<'a> {
    fn new(pending: &'a DashMap<String, usize>, session_id: &str) -> Self {
        *pending.entry(session_id.to_string()).or_insert(0) += 1;
        Self {
            pending,
            session_id: session_id.to_string(),
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut count) = self.pending.get_mut(&self.session_id) {
            *count = count.saturating_sub(1);
        }
        self.pending.remove_if(&self.session_id, |_, count| *count == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn turn_json(id: i64, role: &str, text: &str) -> serde_json::Value {
        json!({
            "id": id,
            "sessionId": "s1",
            "role": role,
            "kind": "text",
            "text": text,
            "createdAt": format!("2026-03-01T10:00:0{id}.000000Z"),
        })
    }

    #[tokio::test]
    async fn fetch_history_caches_until_invalidated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([turn_json(1, "user", "hi"), turn_json(2, "assistant", "hello")])),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri()).unwrap();
        let first = client.fetch_history("s1").await.unwrap();
        let second = client.fetch_history("s1").await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);

        client.invalidate("s1");
        let third = client.fetch_history("s1").await.unwrap();
        assert_eq!(third, first);
    }

    #[tokio::test]
    async fn fetch_history_not_found_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri()).unwrap();
        assert!(client.fetch_history("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_ids_are_path_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/a%20b%2Fc/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri()).unwrap();
        assert!(client.refresh_history("a b/c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_turn_invalidates_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([turn_json(1, "user", "hi"), turn_json(2, "assistant", "hello")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_json(json!({"sessionId": "s1", "text": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(turn_json(2, "assistant", "hello")))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri()).unwrap();
        assert!(client.fetch_history("s1").await.unwrap().is_empty());

        let reply = client.send_turn("s1", Some("hi".to_string()), None).await.unwrap();
        assert_eq!(reply.text.as_deref(), Some("hello"));
        assert!(!client.is_pending("s1"));

        let history = client.fetch_history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], reply);
    }

    #[tokio::test]
    async fn history_read_in_flight_during_send_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(400)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([turn_json(1, "user", "hi"), turn_json(2, "assistant", "hello")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(turn_json(2, "assistant", "hello")))
            .mount(&server)
            .await;

        let client = Arc::new(ChatClient::new(&server.uri()).unwrap());
        let poller = Arc::clone(&client);
        let poll = tokio::spawn(async move { poller.fetch_history("s1").await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        client.send_turn("s1", Some("hi".to_string()), None).await.unwrap();

        // The slow read saw the pre-send log.
        assert!(poll.await.unwrap().unwrap().is_empty());

        let history = client.fetch_history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn failed_send_is_an_error_and_keeps_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([turn_json(1, "user", "hi")])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"code": "PROVIDER_ERROR", "message": "Internal server error"})),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri()).unwrap();
        client.fetch_history("s1").await.unwrap();

        let err = client.send_turn("s1", Some("again".to_string()), None).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Status { status: 500, ref message } if message == "Internal server error"
        ));
        assert!(!client.is_pending("s1"));
        // Served from cache: the GET mock expects exactly one call.
        assert_eq!(client.fetch_history("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn is_pending_while_send_outstanding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(turn_json(2, "assistant", "hello"))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let client = Arc::new(ChatClient::new(&server.uri()).unwrap());
        let sender = Arc::clone(&client);
        let handle = tokio::spawn(async move { sender.send_turn("s1", None, None).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(client.is_pending("s1"));
        assert!(!client.is_pending("s2"));

        handle.await.unwrap().unwrap();
        assert!(!client.is_pending("s1"));
    }

    #[tokio::test]
    async fn undecodable_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri()).unwrap();
        let err = client.send_turn("s1", None, None).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            ChatClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
