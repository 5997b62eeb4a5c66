//! Whisper transcription over the OpenAI-compatible audio API.
//!
//! Uploads the voice note as multipart form data to
//! `{base_url}/audio/transcriptions` and returns the `text` field.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use promptwright_core::transcript::Transcriber;
use promptwright_types::config::TranscriptionSettings;
use promptwright_types::error::TranscriptionError;
use promptwright_types::message::AudioPayload;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// `Transcriber` backed by a Whisper-compatible HTTP endpoint.
///
/// Does NOT derive Debug to keep the API key out of logs.
pub struct WhisperTranscriber {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
}

impl WhisperTranscriber {
    pub fn new(
        settings: &TranscriptionSettings,
        api_key: SecretString,
    ) -> Result<Self, TranscriptionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: transcription_endpoint(&settings.base_url),
            model: settings.model.clone(),
            api_key,
        })
    }

    fn form(&self, audio: &AudioPayload) -> Result<Form, TranscriptionError> {
        let part = Part::bytes(audio.data.clone())
            .file_name(audio.file_name())
            .mime_str(&audio.mime_type)
            .map_err(|e| TranscriptionError::Request(format!("invalid audio MIME type: {e}")))?;

        Ok(Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", part))
    }
}

fn transcription_endpoint(base_url: &str) -> String {
    format!("{}/audio/transcriptions", base_url.trim_end_matches('/'))
}

impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, TranscriptionError> {
        if audio.data.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        let form = self.form(audio)?;
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Request(format!("invalid transcription response: {e}")))?;

        tracing::debug!(
            model = %self.model,
            bytes = audio.data.len(),
            chars = parsed.text.len(),
            "Voice note transcribed"
        );
        Ok(parsed.text)
    }
}
