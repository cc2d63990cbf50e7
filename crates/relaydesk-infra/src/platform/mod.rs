//! Outbound delivery to messaging platforms over their HTTP APIs.

pub mod sender;

pub use sender::HttpPlatformSender;
