//! Ordinary training replies.
//!
//! While training, turns that are not feedback get an in-character answer
//! generated from the user's current durable prompt, so the operator can see
//! how the bot behaves before and after each regeneration.

use std::sync::Arc;

use promptwright_types::config::TrainingConfig;
use promptwright_types::error::RepositoryError;
use promptwright_types::llm::{CompletionRequest, Message};
use promptwright_types::training::{ConversationTurn, UserId, render_transcript};

use crate::llm::box_provider::BoxLlmProvider;
use crate::repository::prompt::PromptRecordRepository;
use crate::training::replies::RESPONDER_APOLOGY;

/// Generates the next assistant reply during training.
pub struct TrainingResponder<R: PromptRecordRepository> {
    repo: Arc<R>,
    provider: Arc<BoxLlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl<R: PromptRecordRepository> TrainingResponder<R> {
    pub fn new(
        repo: Arc<R>,
        provider: Arc<BoxLlmProvider>,
        model: impl Into<String>,
        config: &TrainingConfig,
    ) -> Self {
        Self {
            repo,
            provider,
            model: model.into(),
            temperature: config.response_temperature,
            max_tokens: config.response_max_tokens,
        }
    }

    /// Reply to the latest turn of `conversation`.
    ///
    /// An oracle failure becomes the apology text. Failing to read the
    /// prompt is a store error and is returned.
    #[tracing::instrument(
        name = "training_reply",
        skip(self, conversation),
        fields(
            user_id = %user_id,
            gen_ai.system = %self.provider.name(),
            gen_ai.request.model = %self.model,
        )
    )]
    pub async fn respond(
        &self,
        user_id: &UserId,
        conversation: &[ConversationTurn],
    ) -> Result<String, RepositoryError> {
        let prompt = self.repo.get_prompt(user_id).await?;

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: conversation.iter().map(Message::from).collect(),
            system: Some(format!(
                "{}\nHistorial de la conversación:\n{}",
                prompt,
                render_transcript(conversation)
            )),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        };

        match self.provider.complete(&request).await {
            Ok(response) => {
                tracing::debug!(response_id = %response.id, stop_reason = %response.stop_reason, "Training reply received");
                Ok(response.content)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Training reply failed; sending apology");
                Ok(RESPONDER_APOLOGY.to_string())
            }
        }
    }
}
