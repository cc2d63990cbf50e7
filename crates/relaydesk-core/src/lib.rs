//! Business logic and repository trait definitions for relaydesk.
//!
//! This crate defines the "ports" (repository and capability traits) that the
//! infrastructure layer implements, plus the real-time core built on top of
//! them: room membership, viewer sessions, fan-out, message relay, unread
//! tracking and conversation ordering. It depends only on `relaydesk-types`,
//! never on `relaydesk-infra` or any database/IO crate.

pub mod directory;
pub mod event;
pub mod realtime;
pub mod relay;
pub mod repository;
pub mod sort;
pub mod unread;

#[cfg(test)]
pub(crate) mod testing;
