//! Shared types, error helpers, and utilities used across all meshrelay crates.

pub mod error;
pub mod hex;
pub mod types;

pub use {error::FromMessage, types::TransportMessage};
