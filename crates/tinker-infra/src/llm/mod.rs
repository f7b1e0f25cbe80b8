//! LLM provider implementations and the provider factory.

pub mod openai_compat;

use secrecy::SecretString;

use tinker_core::llm::box_provider::BoxLlmProvider;
use tinker_types::config::ProviderSettings;
use tinker_types::llm::LlmError;

use self::openai_compat::{OpenAiCompatibleProvider, default_base_url};

/// Create a [`BoxLlmProvider`] from provider settings and a resolved API key.
///
/// `base_url` wins when set; otherwise the provider name must be one with a
/// known default endpoint.
pub fn create_provider(
    settings: &ProviderSettings,
    api_key: SecretString,
) -> Result<BoxLlmProvider, LlmError> {
    let base_url = match settings.base_url.as_deref() {
        Some(url) => url.to_string(),
        None => default_base_url(&settings.name)
            .ok_or_else(|| {
                LlmError::InvalidRequest(format!(
                    "provider '{}' has no default endpoint; set provider.base_url",
                    settings.name
                ))
            })?
            .to_string(),
    };

    tracing::info!(
        provider = %settings.name,
        model = %settings.model,
        base_url = %base_url,
        "Creating LLM provider"
    );

    let provider =
        OpenAiCompatibleProvider::new(settings.name.clone(), base_url, api_key, &settings.model)?;
    Ok(BoxLlmProvider::new(provider))
}
