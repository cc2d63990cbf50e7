//! Unread tracking: pure recompute rule, observer list and the stateful engine.

pub mod compute;
pub mod engine;
pub mod observer;

pub use compute::{compute_unread, Watermarks};
pub use engine::UnreadEngine;
pub use observer::{ObserverList, SubscriptionId};
