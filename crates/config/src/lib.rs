//! Configuration loading, channel mapping, env substitution, and validation.
//!
//! Settings come from the process environment (optionally seeded from a
//! `.env` file by the binary). Channel mappings come from a separate
//! document, `channels.json` by default, which may also be TOML or YAML.
//!
//! Supports `${ENV_VAR}` substitution in the channel mapping document.

pub mod channels;
pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    channels::{ChannelMap, ChannelMapping},
    error::{Error, Result},
    loader::{DEFAULT_CHANNELS_FILE, load_config, load_config_with},
    schema::{
        DiscordConfig, LogLevel, MetricsConfig, MqttConfig, Qos, RelayConfig, RelaySettings,
        TransportMode,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
