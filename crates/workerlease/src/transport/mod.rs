//! Transport layer for workerlease.
//!
//! Currently provides the legacy JSON-over-HTTP protocol via axum.

pub mod http;

pub use http::{ServerConfig, serve};
