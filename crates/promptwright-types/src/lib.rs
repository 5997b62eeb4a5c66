//! Shared domain types for Promptwright.
//!
//! This crate contains the core domain types used across the Promptwright
//! workspace: prompt records, modifications, training conversation turns,
//! inbound/outbound message shapes, LLM request/response types, and their
//! associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod error;
pub mod llm;
pub mod message;
pub mod training;
