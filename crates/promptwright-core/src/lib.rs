//! Business logic and port trait definitions for Promptwright.
//!
//! This crate defines the "ports" (LLM provider, prompt record repository,
//! transcriber) that the infrastructure layer implements, plus the training
//! session controller that drives them. It depends only on
//! `promptwright-types` -- never on `promptwright-infra` or any database/IO crate.

pub mod llm;
pub mod repository;
pub mod training;
pub mod transcript;
