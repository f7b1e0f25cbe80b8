//! LlmProvider trait definition.
//!
//! This is the core abstraction that all completion providers implement.
//! Uses RPITIT for `complete`; [`super::box_provider::BoxLlmProvider`] adds
//! dynamic dispatch on top.

use tinker_types::llm::{CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities};

/// Trait for LLM provider backends (OpenAI-compatible endpoints, test fakes).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Implementations live in tinker-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// What this provider supports (vision, JSON mode, limits).
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
