//! Speech-to-text adapters implementing `Transcriber` from promptwright-core.

pub mod whisper;
