//! Modification classification via LLM.
//!
//! `ModificationClassifier` asks the oracle whether the latest training turn
//! is feedback meant to change the governing prompt. The answer must be a
//! single JSON object; anything else, including a failed call, degrades to
//! [`ClassifierVerdict::NotAModification`] so ordinary conversation is never
//! blocked by a bad classification.

use std::sync::Arc;

use serde::Deserialize;

use promptwright_types::config::TrainingConfig;
use promptwright_types::llm::{CompletionRequest, Message};
use promptwright_types::training::{
    ClassifierVerdict, ConversationTurn, Modification, TurnRole, render_transcript,
};

use crate::llm::box_provider::BoxLlmProvider;

/// Instruction appended after the rendered transcript.
const CLASSIFIER_INSTRUCTIONS: &str = "Por favor, analiza la conversación anterior y determina si hay sugerencias para mejorar el chatbot. Responde exclusivamente con un objeto JSON que contenga las siguientes propiedades: 'is_modification' (booleano). Si 'is_modification' es verdadero, incluye también 'modification_type' (cadena) y 'description' (cadena). No incluyas ningún otro texto.";

/// Verdict as returned by the oracle, before validation.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    is_modification: bool,
    #[serde(default)]
    modification_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Why an oracle answer was rejected.
#[derive(Debug, PartialEq, Eq)]
enum VerdictRejection {
    NotJson(String),
    NotAnObject,
    MissingField(&'static str),
}

/// Classifies training turns as feedback or ordinary conversation.
pub struct ModificationClassifier {
    provider: Arc<BoxLlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl ModificationClassifier {
    pub fn new(provider: Arc<BoxLlmProvider>, model: impl Into<String>, config: &TrainingConfig) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: config.classifier_temperature,
            max_tokens: config.classifier_max_tokens,
        }
    }

    /// Classify the latest user turn in `transcript`.
    ///
    /// Never fails: every error path logs a warning and yields
    /// `NotAModification`.
    #[tracing::instrument(
        name = "classify_modification",
        skip(self, transcript),
        fields(
            gen_ai.system = %self.provider.name(),
            gen_ai.request.model = %self.model,
            turns = transcript.len(),
        )
    )]
    pub async fn classify(&self, transcript: &[ConversationTurn]) -> ClassifierVerdict {
        let Some(last_user) = transcript.iter().rev().find(|t| t.role == TurnRole::User) else {
            tracing::warn!("No user turn to classify; treating as ordinary conversation");
            return ClassifierVerdict::NotAModification;
        };

        let request = build_request(&self.model, transcript, &last_user.content, self.temperature, self.max_tokens);

        let response = match self.provider.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Classifier call failed; treating as ordinary conversation");
                return ClassifierVerdict::NotAModification;
            }
        };

        match parse_verdict(&response.content) {
            Ok(verdict) => {
                tracing::debug!(
                    is_modification = verdict.is_modification(),
                    "Classifier verdict parsed"
                );
                verdict
            }
            Err(rejection) => {
                let raw = response.content.trim();
                tracing::warn!(
                    rejection = ?rejection,
                    content_preview = %raw.chars().take(200).collect::<String>(),
                    "Unusable classifier output; treating as ordinary conversation"
                );
                ClassifierVerdict::NotAModification
            }
        }
    }
}

fn build_request(
    model: &str,
    transcript: &[ConversationTurn],
    last_user_message: &str,
    temperature: f64,
    max_tokens: u32,
) -> CompletionRequest {
    let system = format!(
        "\nConversación:\n{}\n\n{CLASSIFIER_INSTRUCTIONS}",
        render_transcript(transcript)
    );

    CompletionRequest {
        model: model.to_string(),
        messages: vec![Message::user(last_user_message)],
        system: Some(system),
        max_tokens,
        temperature: Some(temperature),
    }
}

/// Strictly parse the oracle answer.
///
/// The trimmed text must be exactly one JSON object. A `true` verdict needs
/// both fields present and non-blank.
fn parse_verdict(raw: &str) -> Result<ClassifierVerdict, VerdictRejection> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| VerdictRejection::NotJson(e.to_string()))?;
    if !value.is_object() {
        return Err(VerdictRejection::NotAnObject);
    }
    let parsed: RawVerdict =
        serde_json::from_value(value).map_err(|e| VerdictRejection::NotJson(e.to_string()))?;

    if !parsed.is_modification {
        return Ok(ClassifierVerdict::NotAModification);
    }

    let modification_type = non_blank(parsed.modification_type)
        .ok_or(VerdictRejection::MissingField("modification_type"))?;
    let description =
        non_blank(parsed.description).ok_or(VerdictRejection::MissingField("description"))?;

    Ok(ClassifierVerdict::Modification(Modification::new(
        modification_type,
        description,
    )))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
