//! Metrics collection and export for meshrelay.
//!
//! This crate provides a unified metrics interface using the `metrics` crate facade.
//! When the `prometheus` feature is enabled, metrics are exported in Prometheus format
//! over a small HTTP listener.
//!
//! # Usage
//!
//! ```rust,ignore
//! use meshrelay_metrics::{counter, relay};
//!
//! counter!(relay::PACKETS_RECEIVED_TOTAL).increment(1);
//! ```
//!
//! # Features
//!
//! - `prometheus`: Enable Prometheus metrics export

mod definitions;
mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
