//! Version information for workerlease.

/// Crate version from Cargo.toml
pub const WORKERLEASE_VERSION: &str = env!("CARGO_PKG_VERSION");
