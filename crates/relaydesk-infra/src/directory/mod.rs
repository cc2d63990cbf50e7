//! HTTP conversation directory: the primary path of the conversation list.

pub mod http;

pub use http::HttpDirectory;
