//! LLM provider implementations.
//!
//! Contains the OpenAI-compatible implementation of the [`LlmProvider`]
//! trait defined in `promptwright-core`, plus a factory ([`create_provider`])
//! that builds it from the `[provider]` section of `config.toml`.
//!
//! [`LlmProvider`]: promptwright_core::llm::provider::LlmProvider

pub mod openai_compat;

use secrecy::SecretString;

use promptwright_core::llm::box_provider::BoxLlmProvider;
use promptwright_types::config::ProviderSettings;
use promptwright_types::llm::LlmError;

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::OpenAiCompatConfig;

/// Create a [`BoxLlmProvider`] from provider settings.
///
/// # Errors
///
/// Returns [`LlmError::AuthenticationFailed`] when no API key was resolved.
pub fn create_provider(
    settings: &ProviderSettings,
    api_key: Option<SecretString>,
) -> Result<BoxLlmProvider, LlmError> {
    let key = api_key.ok_or(LlmError::AuthenticationFailed)?;
    let provider = OpenAiCompatibleProvider::new(OpenAiCompatConfig::from_settings(settings, key));
    tracing::debug!(
        provider = %settings.name,
        base_url = %settings.base_url,
        model = %settings.model,
        "LLM provider configured"
    );
    Ok(BoxLlmProvider::new(provider))
}
