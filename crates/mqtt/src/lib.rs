//! MQTT transport.
//!
//! Subscribes to the configured topic filter and hands every publish to the
//! relay as a [`TransportMessage`](meshrelay_common::TransportMessage).

pub mod error;
pub mod options;
mod tls;
pub mod transport;

pub use {
    error::{Error, Result},
    options::build_options,
    transport::MqttTransport,
};
