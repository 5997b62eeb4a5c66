//! Configuration for the OpenAI-compatible provider.
//!
//! Any endpoint speaking the chat completions protocol works; the provider
//! name and model select the output limit reported as capabilities.

use secrecy::SecretString;

use promptwright_types::config::ProviderSettings;
use promptwright_types::llm::ProviderCapabilities;

/// Configuration for an OpenAI-compatible LLM provider.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openai", "mistral").
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    pub base_url: String,
    pub api_key: SecretString,
    /// Model used when a request leaves `model` empty.
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

impl OpenAiCompatConfig {
    /// Build a config from the `[provider]` section of `config.toml`.
    pub fn from_settings(settings: &ProviderSettings, api_key: SecretString) -> Self {
        Self {
            provider_name: settings.name.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            capabilities: default_capabilities(&settings.name, &settings.model),
        }
    }
}

/// Output limits for well-known providers and models.
pub fn default_capabilities(provider_name: &str, model: &str) -> ProviderCapabilities {
    match (provider_name, model) {
        ("openai", "gpt-4") => ProviderCapabilities {
            max_output_tokens: 8_192,
        },
        ("openai", _) => ProviderCapabilities {
            max_output_tokens: 16_384,
        },
        ("gemini", _) => ProviderCapabilities {
            max_output_tokens: 65_536,
        },
        ("mistral", _) => ProviderCapabilities {
            max_output_tokens: 32_768,
        },
        _ => ProviderCapabilities {
            max_output_tokens: 4_096,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_from_default_settings() {
        let config = OpenAiCompatConfig::from_settings(
            &ProviderSettings::default(),
            SecretString::from("sk-test".to_string()),
        );
        assert_eq!(config.provider_name, "openai");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.api_key.expose_secret(), "sk-test");
        assert_eq!(config.capabilities.max_output_tokens, 8_192);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let settings = ProviderSettings {
            base_url: "https://api.mistral.ai/v1/".to_string(),
            name: "mistral".to_string(),
            model: "mistral-large-latest".to_string(),
            ..ProviderSettings::default()
        };
        let config =
            OpenAiCompatConfig::from_settings(&settings, SecretString::from("k".to_string()));
        assert_eq!(config.base_url, "https://api.mistral.ai/v1");
        assert_eq!(config.capabilities.max_output_tokens, 32_768);
    }

    #[test]
    fn test_unknown_provider_gets_conservative_limits() {
        let caps = default_capabilities("local-llama", "llama3");
        assert_eq!(caps.max_output_tokens, 4_096);
    }
}
