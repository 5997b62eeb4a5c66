//! Prompt regeneration via LLM.
//!
//! `PromptSynthesizer` folds a batch of pending modifications into the
//! current governing prompt. It only produces text; persisting the result is
//! the ledger's job, so a failed synthesis never touches the record.

use std::sync::Arc;

use promptwright_types::config::TrainingConfig;
use promptwright_types::llm::{CompletionRequest, LlmError, Message, StopReason};
use promptwright_types::training::Modification;

use crate::llm::box_provider::BoxLlmProvider;

const SYNTHESIZER_SYSTEM_PROMPT: &str = "Eres una IA que mejora los prompts de chatbots basándose en el feedback y modificaciones de los usuarios.";

/// Errors from a synthesis attempt.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("oracle call failed: {0}")]
    Oracle(#[from] LlmError),

    #[error("oracle returned an empty prompt")]
    EmptyPrompt,
}

/// Rewrites the governing prompt from a batch of modifications.
pub struct PromptSynthesizer {
    provider: Arc<BoxLlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    trailer: String,
}

impl PromptSynthesizer {
    pub fn new(provider: Arc<BoxLlmProvider>, model: impl Into<String>, config: &TrainingConfig) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: config.synthesis_temperature,
            max_tokens: config.synthesis_max_tokens,
            trailer: config.prompt_trailer.clone(),
        }
    }

    /// Produce a revised prompt integrating `batch` into `current_prompt`.
    ///
    /// The result always ends with the configured trailer sentence.
    #[tracing::instrument(
        name = "synthesize_prompt",
        skip(self, current_prompt, batch),
        fields(
            gen_ai.system = %self.provider.name(),
            gen_ai.request.model = %self.model,
            batch_size = batch.len(),
        )
    )]
    pub async fn synthesize(
        &self,
        current_prompt: &str,
        batch: &[Modification],
    ) -> Result<String, SynthesisError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(self.render_instruction(current_prompt, batch))],
            system: Some(SYNTHESIZER_SYSTEM_PROMPT.to_string()),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        };

        let response = self.provider.complete(&request).await?;

        let prompt = response.content.trim();
        if prompt.is_empty() {
            return Err(SynthesisError::EmptyPrompt);
        }

        if response.stop_reason == StopReason::MaxTokens {
            tracing::warn!(
                response_id = %response.id,
                max_tokens = request.max_tokens,
                "Synthesized prompt hit the output limit and may be cut short"
            );
        }

        let prompt = ensure_trailer(prompt, &self.trailer);
        tracing::info!(
            response_id = %response.id,
            prompt_chars = prompt.len(),
            output_tokens = response.usage.output_tokens,
            "Synthesized new prompt"
        );
        Ok(prompt)
    }

    fn render_instruction(&self, current_prompt: &str, batch: &[Modification]) -> String {
        format!(
            "Prompt actual:\n{current_prompt}\n\nModificaciones a incorporar:\n{}\n\nCrea un prompt mejorado que incorpore estas modificaciones manteniendo la funcionalidad principal. Importante: siempre al final del prompt añade esta frase: {}",
            render_modifications(batch),
            self.trailer
        )
    }
}

/// Render modifications as `Tipo`/`Descripción` pairs separated by blank lines.
pub fn render_modifications(batch: &[Modification]) -> String {
    batch
        .iter()
        .map(|m| format!("Tipo: {}\nDescripción: {}", m.modification_type, m.description))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn ensure_trailer(prompt: &str, trailer: &str) -> String {
    let trailer = trailer.trim();
    if trailer.is_empty() || prompt.trim_end().ends_with(trailer) {
        prompt.to_string()
    } else {
        format!("{prompt}\n\n{trailer}")
    }
}
