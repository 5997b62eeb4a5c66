//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! The training controller is generic over its store and transcriber, but
//! AppState pins it to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;

use promptwright_core::training::controller::TrainingController;
use promptwright_infra::config::{load_global_config, resolve_api_key, resolve_data_dir};
use promptwright_infra::llm::create_provider;
use promptwright_infra::sqlite::pool::DatabasePool;
use promptwright_infra::sqlite::prompt_record::SqlitePromptRecordRepository;
use promptwright_infra::transcription::whisper::WhisperTranscriber;
use promptwright_types::config::GlobalConfig;
use promptwright_types::training::UserId;

/// Concrete type alias for the controller generics pinned to infra implementations.
pub type ConcreteController = TrainingController<SqlitePromptRecordRepository, WhisperTranscriber>;

/// How often the sweeper drops sessions idle past the configured timeout.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub prompts: Arc<SqlitePromptRecordRepository>,
    /// `None` when no API key is configured; prompt inspection still works.
    pub controller: Option<Arc<ConcreteController>>,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
    /// Idle-session sweeper, running while `controller` is set.
    sweeper: Option<Arc<JoinHandle<()>>>,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_global_config(&data_dir).await;

        let db_pool = DatabasePool::open_in(&data_dir)
            .await
            .with_context(|| format!("failed to open database in {}", data_dir.display()))?;
        let prompts = Arc::new(SqlitePromptRecordRepository::new(db_pool.clone()));

        let (controller, sweeper) = match resolve_api_key(&config) {
            Some(api_key) => {
                let (controller, sweeper) = build_training(prompts.clone(), &config, api_key)?;
                (Some(controller), Some(Arc::new(sweeper)))
            }
            None => {
                tracing::debug!(
                    env = %config.provider.api_key_env,
                    "No API key configured; training is disabled"
                );
                (None, None)
            }
        };

        Ok(Self {
            prompts,
            controller,
            config: Arc::new(config),
            data_dir,
            sweeper,
        })
    }

    /// The training controller, or an error explaining how to enable it.
    pub fn training(&self) -> anyhow::Result<&Arc<ConcreteController>> {
        self.controller.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "{} is not set. Export it to enable training sessions.",
                self.config.provider.api_key_env
            )
        })
    }

    /// Stop the idle-session sweeper. Live sessions are left as they are.
    pub fn stop_sweeper(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
    }

    /// `explicit` when given, else the configured default user.
    pub fn user_or_default(&self, explicit: Option<String>) -> UserId {
        UserId::new(explicit.unwrap_or_else(|| self.config.default_user_id.clone()))
    }
}

/// Wire the oracle, transcriber and controller, and start the sweeper.
fn build_training(
    prompts: Arc<SqlitePromptRecordRepository>,
    config: &GlobalConfig,
    api_key: SecretString,
) -> anyhow::Result<(Arc<ConcreteController>, JoinHandle<()>)> {
    let llm_key = SecretString::from(api_key.expose_secret().to_owned());
    let provider = create_provider(&config.provider, Some(llm_key))?;
    let transcriber = WhisperTranscriber::new(&config.transcription, api_key)?;

    let controller = TrainingController::new(prompts, Arc::new(provider), transcriber, config);
    let sweeper = controller.registry().spawn_sweeper(SWEEP_INTERVAL);
    Ok((Arc::new(controller), sweeper))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_training_starts_sweeper() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open_in(dir.path()).await.unwrap();
        let prompts = Arc::new(SqlitePromptRecordRepository::new(pool));
        let config = GlobalConfig::default();

        let (controller, sweeper) =
            build_training(prompts, &config, SecretString::from("sk-test".to_string())).unwrap();
        assert!(controller.registry().is_empty());
        assert!(!sweeper.is_finished());

        sweeper.abort();
        assert!(sweeper.await.unwrap_err().is_cancelled());
    }
}
