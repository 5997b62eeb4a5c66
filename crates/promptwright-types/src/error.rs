use thiserror::Error;

/// Errors from repository operations (used by trait definitions in promptwright-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the speech-to-text collaborator.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("audio payload is empty")]
    EmptyAudio,

    #[error("transcription request failed: {0}")]
    Request(String),

    #[error("transcription service returned status {status}: {body}")]
    Service { status: u16, body: String },
}

/// Errors that escape a training turn.
///
/// Oracle failures never appear here: the classifier, synthesizer and
/// responder each degrade locally. Only persistence failures propagate.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}
