//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (relaydesk-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod conversation;
pub mod message;
pub mod platform_bot;
pub mod unread_snapshot;

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}
