//! Infrastructure layer for relaydesk.
//!
//! Implements the traits defined in `relaydesk-core`: SQLite stores, the
//! platform senders (Telegram, WhatsApp, Instagram), automated reply
//! generators, the HTTP conversation directory and the config loader.

pub mod config;
pub mod directory;
pub mod platform;
pub mod reply;
pub mod sqlite;
