//! Training domain types.
//!
//! A training session lets an operator refine a bot's governing prompt by
//! chatting with it. Feedback detected in the conversation becomes a
//! [`Modification`]; modifications accumulate on the durable
//! [`PromptRecord`] until a batch is folded into a regenerated prompt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::llm::{Message, MessageRole};

/// Identifier of the durable prompt record (one per bot owner).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport-level conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A classified piece of feedback intended to alter the governing prompt.
///
/// Immutable once created; only the classifier produces these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub modification_type: String,
    pub description: String,
}

impl Modification {
    pub fn new(modification_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            modification_type: modification_type.into(),
            description: description.into(),
        }
    }
}

/// A modification as kept in the append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedModification {
    #[serde(flatten)]
    pub modification: Modification,
    pub recorded_at: DateTime<Utc>,
}

/// Durable per-user training record.
///
/// `pending_modifications` is most-recent-first and is only cleared right
/// after a regeneration that consumed it. `history` is chronological and
/// never pruned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRecord {
    pub user_id: UserId,
    pub prompt: String,
    pub pending_modifications: Vec<Modification>,
    pub history: Vec<RecordedModification>,
    /// Consecutive failed regeneration attempts since the last success.
    pub flush_failures: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptRecord {
    /// The default record created lazily on first read.
    pub fn empty(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            prompt: String::new(),
            pending_modifications: Vec::new(),
            history: Vec::new(),
            flush_failures: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Why a prompt version was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptChangeReason {
    /// Regenerated from a batch of pending modifications.
    Regenerated,
    /// Replaced by an operator.
    Manual,
}

impl fmt::Display for PromptChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptChangeReason::Regenerated => write!(f, "regenerated"),
            PromptChangeReason::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for PromptChangeReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regenerated" => Ok(PromptChangeReason::Regenerated),
            "manual" => Ok(PromptChangeReason::Manual),
            other => Err(format!("invalid prompt change reason: '{other}'")),
        }
    }
}

/// A snapshot of the prompt after a change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVersion {
    /// 1-based, monotonically increasing per user.
    pub version: i32,
    pub prompt: String,
    pub reason: PromptChangeReason,
    /// How many modifications were folded in (0 for manual edits).
    pub modifications_applied: u32,
    pub created_at: DateTime<Utc>,
}

/// Speaker of a turn in the training conversation buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of the in-memory training conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for Message {
    fn from(turn: &ConversationTurn) -> Self {
        Message {
            role: match turn.role {
                TurnRole::User => MessageRole::User,
                TurnRole::Assistant => MessageRole::Assistant,
            },
            content: turn.content.clone(),
        }
    }
}

/// Render a transcript as `role: content` lines.
pub fn render_transcript(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Outcome of classifying the latest training turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierVerdict {
    NotAModification,
    Modification(Modification),
}

impl ClassifierVerdict {
    pub fn is_modification(&self) -> bool {
        matches!(self, ClassifierVerdict::Modification(_))
    }
}

/// Mode of a conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    Idle,
    Training,
}

/// Ephemeral working memory of one live training session.
///
/// Created when the session enters training and discarded on exit. Never
/// persisted.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub mode: TrainingMode,
    /// The durable record this session trains.
    pub user_id: UserId,
    pub conversation: Vec<ConversationTurn>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionState {
    pub fn training(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            mode: TrainingMode::Training,
            user_id,
            conversation: Vec::new(),
            started_at: now,
            last_activity: now,
        }
    }
}
