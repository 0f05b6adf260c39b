/// Config schema types (transport, relay, destination, metrics).
use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::channels::ChannelMap;

/// Wire transport used to reach the broker.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Tcp,
    Websockets,
}

impl TransportMode {
    /// Anything other than `websockets` selects plain TCP.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "websockets" => Self::Websockets,
            _ => Self::Tcp,
        }
    }
}

/// MQTT delivery guarantee for the subscription.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Qos {
    /// Map a numeric level; out-of-range values fall back to 0.
    pub fn from_level(level: i64) -> Self {
        match level {
            1 => Self::AtLeastOnce,
            2 => Self::ExactlyOnce,
            _ => Self::AtMostOnce,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

/// Log verbosity accepted by `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Unknown levels fall back to `info`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Subscription filter, e.g. `meshcore/#`.
    pub topic: String,
    pub transport: TransportMode,
    /// Request path used with the websockets transport.
    pub ws_path: String,
    pub tls: bool,
    /// Skip server certificate verification.
    pub tls_insecure: bool,
    pub ca_cert_path: Option<PathBuf>,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    pub qos: Qos,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            topic: "meshcore/#".into(),
            transport: TransportMode::Tcp,
            ws_path: "/mqtt".into(),
            tls: false,
            tls_insecure: false,
            ca_cert_path: None,
            client_id: None,
            username: None,
            password: None,
            qos: Qos::AtMostOnce,
        }
    }
}

impl MqttConfig {
    /// Broker URL, for logging and for the websockets transport.
    pub fn url(&self) -> String {
        let scheme = match (self.transport, self.tls) {
            (TransportMode::Websockets, true) => "wss",
            (TransportMode::Websockets, false) => "ws",
            (TransportMode::Tcp, true) => "mqtts",
            (TransportMode::Tcp, false) => "mqtt",
        };
        match self.transport {
            TransportMode::Websockets => {
                let path = if self.ws_path.starts_with('/') {
                    self.ws_path.clone()
                } else {
                    format!("/{}", self.ws_path)
                };
                format!("{scheme}://{}:{}{path}", self.host, self.port)
            },
            TransportMode::Tcp => format!("{scheme}://{}:{}", self.host, self.port),
        }
    }
}

/// Relay behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Dedupe window; the cache enforces a 5 second floor.
    pub dedupe_seconds: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            dedupe_seconds: 45,
        }
    }
}

/// Discord destination settings.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token.
    pub token: Secret<String>,
    pub default_channel_id: Option<String>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"[REDACTED]")
            .field("default_channel_id", &self.default_channel_id)
            .finish()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            default_channel_id: None,
        }
    }
}

impl DiscordConfig {
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().is_empty()
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Default)]
pub struct MetricsConfig {
    /// Socket address for the HTTP exporter; disabled when unset.
    pub listen: Option<String>,
}

/// Root configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    pub mqtt: MqttConfig,
    pub relay: RelaySettings,
    pub discord: DiscordConfig,
    pub metrics: MetricsConfig,
    /// Mapping document the channels were read from.
    pub channels_file: PathBuf,
    /// Why the mapping document could not be read, if it exists but failed.
    pub channels_file_error: Option<String>,
    pub channels: ChannelMap,
    /// Normalized secrets for the decoder key store.
    pub channel_secrets: Vec<String>,
}
