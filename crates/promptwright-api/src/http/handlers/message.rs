//! Inbound message endpoint: the seam a chat transport talks through.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use promptwright_types::message::{AudioPayload, InboundMessage, Reply, TurnOutcome};
use promptwright_types::training::{SessionId, UserId};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for `POST /api/v1/sessions/{session_id}/messages`.
#[derive(Debug, Default, Deserialize)]
pub struct SendMessageRequest {
    pub text: Option<String>,
    /// Voice note bytes, standard base64.
    pub audio_base64: Option<String>,
    /// MIME type of the voice note; `audio/ogg` when omitted.
    pub audio_mime_type: Option<String>,
    /// Prompt record to train; defaults to the configured user.
    pub user_id: Option<String>,
}

impl SendMessageRequest {
    /// Validate and convert into the controller's inbound shape.
    pub fn into_inbound(self, session_id: &str) -> Result<InboundMessage, AppError> {
        if session_id.trim().is_empty() {
            return Err(AppError::Validation("session id must not be empty".to_string()));
        }
        if self.text.is_none() && self.audio_base64.is_none() {
            return Err(AppError::Validation(
                "message needs `text` or `audio_base64`".to_string(),
            ));
        }

        let audio = match self.audio_base64 {
            Some(encoded) => {
                let data = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| AppError::Validation(format!("invalid audio_base64: {e}")))?;
                Some(AudioPayload {
                    data,
                    mime_type: self
                        .audio_mime_type
                        .unwrap_or_else(|| "audio/ogg".to_string()),
                })
            }
            None => None,
        };

        Ok(InboundMessage {
            session_id: SessionId::new(session_id),
            user_id: self
                .user_id
                .filter(|u| !u.trim().is_empty())
                .map(UserId::new),
            text: self.text,
            audio,
        })
    }
}

/// Response payload for a processed message.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    /// False when the message does not belong to a training flow.
    pub handled: bool,
    pub replies: Vec<Reply>,
    /// Whether the session is in training after this message.
    pub training: bool,
}

/// POST /api/v1/sessions/{session_id}/messages - Offer a message to the trainer.
pub async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<SendMessageResponse>>, AppError> {
    let start = Instant::now();
    let controller = state
        .training()
        .map_err(|e| AppError::TrainingDisabled(e.to_string()))?;

    let message = body.into_inbound(&session_id)?;
    let outcome = controller.handle_or_apologize(&message).await;

    let data = SendMessageResponse {
        handled: outcome.is_handled(),
        training: controller.is_training(&message.session_id),
        replies: match outcome {
            TurnOutcome::Handled(replies) => replies,
            TurnOutcome::NotHandled => Vec::new(),
        },
    };

    let resp = ApiResponse::success(data, start)
        .with_link("self", &format!("/api/v1/sessions/{session_id}/messages"));
    Ok(Json(resp))
}
