//! OpenAiCompatibleProvider -- [`LlmProvider`] for any endpoint speaking the
//! OpenAI chat completions protocol (OpenAI, OpenRouter, Gemini's OpenAI
//! endpoint, local gateways).
//!
//! Requests use JSON-object response mode when asked and send images as
//! `image_url` content parts. The API key is wrapped in [`SecretString`] and
//! only exposed when building the `Authorization` header.

pub mod types;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use tinker_core::llm::provider::LlmProvider;
use tinker_types::llm::{
    CompletionRequest, CompletionResponse, ContentPart as PromptPart, LlmError, PromptTurn,
    ProviderCapabilities, StopReason, Usage,
};

use self::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ContentPart, ErrorResponse,
    ImageUrl, MessageContent, ResponseFormat,
};

/// Default base URL for known provider names.
pub fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "gemini" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        "mistral" => Some("https://api.mistral.ai/v1"),
        _ => None,
    }
}

/// Provider for OpenAI-compatible chat completion endpoints.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    api_key: SecretString,
    provider_name: String,
    base_url: String,
    capabilities: ProviderCapabilities,
}

// No Debug: the struct holds the API key.

impl OpenAiCompatibleProvider {
    pub fn new(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: SecretString,
        model: &str,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            provider_name: provider_name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            capabilities: Self::capabilities_for_model(model),
        })
    }

    fn capabilities_for_model(model: &str) -> ProviderCapabilities {
        if model.starts_with("gpt-4o") || model.starts_with("gpt-4.1") || model.starts_with("gpt-5") {
            ProviderCapabilities {
                vision: true,
                json_mode: true,
                max_context_tokens: 128_000,
                max_output_tokens: 16_384,
            }
        } else {
            // Conservative defaults for unknown models
            ProviderCapabilities {
                vision: false,
                json_mode: true,
                max_context_tokens: 32_000,
                max_output_tokens: 4_096,
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn to_wire_request(request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(to_wire_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_output.then(ResponseFormat::json_object),
        }
    }
}

fn to_wire_message(turn: &PromptTurn) -> ChatMessage {
    let content = if turn.has_image() {
        MessageContent::Parts(
            turn.content
                .iter()
                .map(|part| match part {
                    PromptPart::Text { text } => ContentPart::Text { text: text.clone() },
                    PromptPart::ImageUrl { url } => ContentPart::ImageUrl {
                        image_url: ImageUrl { url: url.clone() },
                    },
                })
                .collect(),
        )
    } else {
        MessageContent::Text(turn.text_content())
    };

    ChatMessage {
        role: turn.role.to_string(),
        content,
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs * 1000)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = Self::to_wire_request(request);
        let url = self.url("/chat/completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = parse_retry_after(response.headers());
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited { retry_after_ms },
                400 | 404 | 422 => LlmError::InvalidRequest(error_message(&error_body)),
                _ => LlmError::Provider {
                    message: format!("HTTP {status}: {}", error_message(&error_body)),
                },
            });
        }

        let wire: ChatCompletionResponse = response.json().await.map_err(|e| {
            LlmError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Deserialization("response contained no choices".to_string()))?;

        let stop_reason = match choice.finish_reason.as_deref() {
            Some("length") => StopReason::MaxTokens,
            Some("content_filter") => StopReason::ContentFilter,
            _ => StopReason::EndTurn,
        };
        let usage = wire
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: wire.id,
            content: choice.message.content.unwrap_or_default(),
            model: wire.model,
            stop_reason,
            usage,
        })
    }
}
