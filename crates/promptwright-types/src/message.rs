//! Transport-facing message shapes.
//!
//! The messaging transport is outside Promptwright; these types are the
//! boundary it talks through. An inbound message carries text, a voice note,
//! or both. The controller answers with zero or more replies.

use serde::{Deserialize, Serialize};

use crate::training::{SessionId, UserId};

/// Raw voice-note bytes as delivered by the transport.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub data: Vec<u8>,
    /// MIME type reported by the transport (e.g. `audio/ogg`).
    pub mime_type: String,
}

impl AudioPayload {
    /// File name with an extension matching the MIME type, used for uploads.
    pub fn file_name(&self) -> String {
        let ext = match self.mime_type.split(';').next().unwrap_or_default().trim() {
            "audio/ogg" | "audio/opus" => "ogg",
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/webm" => "webm",
            _ => "ogg",
        };
        format!("voice_note.{ext}")
    }
}

/// A message received from the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub session_id: SessionId,
    /// Durable record to train; falls back to the configured default.
    pub user_id: Option<UserId>,
    pub text: Option<String>,
    pub audio: Option<AudioPayload>,
}

impl InboundMessage {
    /// Plain text message with no explicit user id.
    pub fn text(session_id: SessionId, text: impl Into<String>) -> Self {
        Self {
            session_id,
            user_id: None,
            text: Some(text.into()),
            audio: None,
        }
    }

    /// Voice note with no accompanying text.
    pub fn voice(session_id: SessionId, audio: AudioPayload) -> Self {
        Self {
            session_id,
            user_id: None,
            text: None,
            audio: Some(audio),
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Reply {
    /// A single plain string.
    Text(String),
    /// Ordered lines presented as one message block.
    Block(Vec<String>),
}

impl Reply {
    /// The reply as it would be shown in a chat bubble.
    pub fn render(&self) -> String {
        match self {
            Reply::Text(text) => text.clone(),
            Reply::Block(lines) => lines.join("\n"),
        }
    }
}

/// Result of offering a message to the training controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The message does not belong to a training flow; other flows may claim it.
    NotHandled,
    /// The controller consumed the message and produced these replies.
    Handled(Vec<Reply>),
}

impl TurnOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, TurnOutcome::Handled(_))
    }

    pub fn replies(&self) -> &[Reply] {
        match self {
            TurnOutcome::NotHandled => &[],
            TurnOutcome::Handled(replies) => replies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_file_name_from_mime() {
        let audio = AudioPayload {
            data: vec![1, 2, 3],
            mime_type: "audio/ogg; codecs=opus".to_string(),
        };
        assert_eq!(audio.file_name(), "voice_note.ogg");

        let audio = AudioPayload {
            data: vec![1],
            mime_type: "audio/mpeg".to_string(),
        };
        assert_eq!(audio.file_name(), "voice_note.mp3");
    }

    #[test]
    fn test_reply_render_block() {
        let reply = Reply::Block(vec!["a".to_string(), String::new(), "b".to_string()]);
        assert_eq!(reply.render(), "a\n\nb");
    }

    #[test]
    fn test_reply_serde_shape() {
        let json = serde_json::to_value(Reply::Text("hola".to_string())).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["content"], "hola");
    }

    #[test]
    fn test_not_handled_has_no_replies() {
        assert!(TurnOutcome::NotHandled.replies().is_empty());
        assert!(!TurnOutcome::NotHandled.is_handled());
    }
}
