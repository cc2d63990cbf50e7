//! Shared domain types for relaydesk.
//!
//! This crate contains the domain types used across the relay: conversations,
//! messages, unread state, operator identity, the real-time wire events and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod auth;
pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod message;
pub mod unread;
