//! Global configuration loader for Promptwright.
//!
//! Reads `config.toml` from the data directory (`~/.promptwright/` in
//! production) and deserializes it into [`GlobalConfig`]. Falls back to
//! defaults when the file is missing or malformed. Environment variables
//! override the data directory, the default user id and supply the API key.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use promptwright_types::config::GlobalConfig;

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "PROMPTWRIGHT_DATA_DIR";

/// Overrides `default_user_id` from `config.toml`.
pub const USER_ID_ENV: &str = "PROMPTWRIGHT_USER_ID";

/// Resolve the data directory: `PROMPTWRIGHT_DATA_DIR`, else `~/.promptwright`.
pub fn resolve_data_dir() -> PathBuf {
    data_dir_from(std::env::var(DATA_DIR_ENV).ok())
}

fn data_dir_from(env_value: Option<String>) -> PathBuf {
    match env_value.filter(|v| !v.trim().is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".promptwright"),
    }
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`GlobalConfig::default()`].
/// - Unreadable or unparsable file: logs a warning, returns the default.
/// - `PROMPTWRIGHT_USER_ID`, when set, replaces `default_user_id`.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let mut config = read_config_file(data_dir).await;
    apply_user_override(&mut config, std::env::var(USER_ID_ENV).ok());
    config
}

async fn read_config_file(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

fn apply_user_override(config: &mut GlobalConfig, env_value: Option<String>) {
    if let Some(user_id) = env_value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        config.default_user_id = user_id;
    }
}

/// Read the API key from the environment variable named by `config.provider.api_key_env`.
pub fn resolve_api_key(config: &GlobalConfig) -> Option<SecretString> {
    std::env::var(&config.provider.api_key_env)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn read_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.default_user_id, "default");
        assert_eq!(config.training.flush_threshold, 3);
    }

    #[tokio::test]
    async fn read_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
default_user_id = "5491122334455"

[training]
flush_threshold = 4
prompt_trailer = "Datos del día:"

[provider]
name = "mistral"
base_url = "https://api.mistral.ai/v1"
model = "mistral-large-latest"
api_key_env = "MISTRAL_API_KEY"
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.default_user_id, "5491122334455");
        assert_eq!(config.training.flush_threshold, 4);
        assert_eq!(config.training.prompt_trailer, "Datos del día:");
        assert_eq!(config.training.exit_keyword, "salir");
        assert_eq!(config.provider.name, "mistral");
        assert_eq!(config.provider.api_key_env, "MISTRAL_API_KEY");
    }

    #[tokio::test]
    async fn read_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.default_user_id, "default");
    }

    #[test]
    fn user_override_replaces_default() {
        let mut config = GlobalConfig::default();
        apply_user_override(&mut config, Some(" 5491100000000 ".to_string()));
        assert_eq!(config.default_user_id, "5491100000000");
    }

    #[test]
    fn blank_user_override_is_ignored() {
        let mut config = GlobalConfig::default();
        apply_user_override(&mut config, Some("  ".to_string()));
        apply_user_override(&mut config, None);
        assert_eq!(config.default_user_id, "default");
    }

    #[test]
    fn data_dir_prefers_env_value() {
        assert_eq!(
            data_dir_from(Some("/srv/promptwright".to_string())),
            PathBuf::from("/srv/promptwright")
        );
        assert!(data_dir_from(None).ends_with(".promptwright"));
        assert!(data_dir_from(Some(String::new())).ends_with(".promptwright"));
    }
}
