//! Global configuration types for Promptwright.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! default prompt owner, training behaviour, and the language-model and
//! transcription endpoints.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.promptwright/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Prompt record trained when an inbound message names no user.
    #[serde(default = "default_user_id")]
    pub default_user_id: String,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub transcription: TranscriptionSettings,
}

fn default_user_id() -> String {
    "default".to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_user_id: default_user_id(),
            training: TrainingConfig::default(),
            provider: ProviderSettings::default(),
            transcription: TranscriptionSettings::default(),
        }
    }
}

/// Training-session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Keyword (case-insensitive) that starts a training session.
    pub train_keyword: String,
    /// Keyword (case-insensitive) that ends a training session.
    pub exit_keyword: String,
    /// Pending modifications needed before the prompt is regenerated.
    pub flush_threshold: usize,
    /// Failed regenerations tolerated before retries back off by whole batches.
    pub max_consecutive_flush_failures: u32,
    /// Live sessions idle for longer than this are dropped.
    pub session_idle_timeout_secs: u64,
    /// Sentence every regenerated prompt must end with.
    pub prompt_trailer: String,
    pub classifier_temperature: f64,
    pub response_temperature: f64,
    pub synthesis_temperature: f64,
    pub classifier_max_tokens: u32,
    pub response_max_tokens: u32,
    pub synthesis_max_tokens: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            train_keyword: "entrenar".to_string(),
            exit_keyword: "salir".to_string(),
            flush_threshold: 3,
            max_consecutive_flush_failures: 3,
            session_idle_timeout_secs: 3600,
            prompt_trailer: "Estos son los datos actualizados al día de hoy del restaurante:"
                .to_string(),
            classifier_temperature: 0.3,
            response_temperature: 0.7,
            synthesis_temperature: 0.7,
            classifier_max_tokens: 512,
            response_max_tokens: 1024,
            synthesis_max_tokens: 4096,
        }
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Human-readable provider name used in logs and spans.
    pub name: String,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Speech-to-text endpoint for voice notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub base_url: String,
    pub model: String,
    /// Per-request timeout for uploads.
    pub timeout_secs: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.default_user_id, "default");
        assert_eq!(config.training.train_keyword, "entrenar");
        assert_eq!(config.training.exit_keyword, "salir");
        assert_eq!(config.training.flush_threshold, 3);
        assert_eq!(config.provider.model, "gpt-4");
        assert_eq!(config.transcription.model, "whisper-1");
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.training.max_consecutive_flush_failures, 3);
        assert_eq!(config.provider.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_global_config_partial_sections() {
        let toml_str = r#"
default_user_id = "5491122334455"

[training]
flush_threshold = 5
exit_keyword = "exit"

[provider]
model = "gpt-4o"
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_user_id, "5491122334455");
        assert_eq!(config.training.flush_threshold, 5);
        assert_eq!(config.training.exit_keyword, "exit");
        assert_eq!(config.training.train_keyword, "entrenar");
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
    }
}
