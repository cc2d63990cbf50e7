//! HTTP layer for relaydesk.
//!
//! Axum router with the duplex socket at `/ws`, one-way SSE streams and the
//! REST API at `/api/v1/`, all in the envelope response format.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
