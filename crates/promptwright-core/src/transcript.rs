//! Transcript normalization.
//!
//! Turns an [`InboundMessage`] into the plain text the controller works on.
//! Voice notes go through a [`Transcriber`]; text passes through trimmed.
//! Any failure collapses to `None` so the caller can ask the user to retry.

use promptwright_types::error::TranscriptionError;
use promptwright_types::message::{AudioPayload, InboundMessage};
use tracing::{debug, warn};

/// Speech-to-text backend.
///
/// Implementations live in promptwright-infra (e.g., `WhisperTranscriber`).
pub trait Transcriber: Send + Sync {
    /// Transcribe a voice note to text.
    fn transcribe(
        &self,
        audio: &AudioPayload,
    ) -> impl std::future::Future<Output = Result<String, TranscriptionError>> + Send;
}

/// Extracts plain text from inbound messages.
pub struct TranscriptNormalizer<T: Transcriber> {
    transcriber: T,
}

impl<T: Transcriber> TranscriptNormalizer<T> {
    pub fn new(transcriber: T) -> Self {
        Self { transcriber }
    }

    /// Plain text of the message, or `None` when nothing usable was extracted.
    ///
    /// Audio takes precedence over any text body.
    pub async fn normalize(&self, message: &InboundMessage) -> Option<String> {
        let raw = match &message.audio {
            Some(audio) => {
                if audio.data.is_empty() {
                    warn!(session_id = %message.session_id, "Voice note has no audio data");
                    return None;
                }
                match self.transcriber.transcribe(audio).await {
                    Ok(text) => {
                        debug!(
                            session_id = %message.session_id,
                            chars = text.len(),
                            "Voice note transcribed"
                        );
                        text
                    }
                    Err(e) => {
                        warn!(
                            session_id = %message.session_id,
                            error = %e,
                            "Voice note transcription failed"
                        );
                        return None;
                    }
                }
            }
            None => message.text.clone()?,
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
