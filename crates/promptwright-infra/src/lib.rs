//! Infrastructure layer for Promptwright.
//!
//! Contains implementations of the port traits defined in `promptwright-core`:
//! SQLite prompt record storage, the OpenAI-compatible LLM provider, Whisper
//! transcription, and the `config.toml` loader.

pub mod config;
pub mod llm;
pub mod sqlite;
pub mod transcription;
