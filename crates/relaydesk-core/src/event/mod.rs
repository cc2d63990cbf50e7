//! Change feed for message rows.
//!
//! Provides a `ChangeFeed` that distributes `ChangeEvent`s to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::ChangeFeed;
