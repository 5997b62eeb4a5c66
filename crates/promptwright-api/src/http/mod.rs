//! HTTP/REST API layer for Promptwright.
//!
//! Axum-based REST API at `/api/v1/` with the envelope response format and
//! CORS support. A chat transport posts inbound messages here and relays
//! the replies.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
