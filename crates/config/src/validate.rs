//! Startup validation.
//!
//! Reports problems that would make the relay useless or insecure before any
//! connection is attempted. Errors abort startup; warnings are logged.

use crate::schema::RelayConfig;

/// Floor applied by the dedupe cache.
const MIN_DEDUPE_SECONDS: u64 = 5;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Environment variable or mapping field the finding refers to.
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Check a loaded configuration.
pub fn validate(config: &RelayConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !config.discord.has_token() {
        result.push(Severity::Error, "DISCORD_TOKEN", "DISCORD_TOKEN is required");
    }

    if let Some(reason) = &config.channels_file_error {
        result.push(
            Severity::Warning,
            "CHANNELS_FILE",
            format!("ignoring {}: {reason}", config.channels_file.display()),
        );
    }

    if config.discord.default_channel_id.is_none() && config.channels.is_empty() {
        result.push(
            Severity::Warning,
            "DISCORD_DEFAULT_CHANNEL_ID",
            "no default Discord channel and no channel mappings configured",
        );
    }

    if config
        .discord
        .default_channel_id
        .as_deref()
        .is_some_and(|id| !is_snowflake(id))
    {
        result.push(
            Severity::Warning,
            "DISCORD_DEFAULT_CHANNEL_ID",
            "default channel id is not a numeric Discord id",
        );
    }

    for mapping in config.channels.iter() {
        if !is_snowflake(&mapping.destination_channel_id) {
            result.push(
                Severity::Warning,
                &format!("channels.{}", mapping.channel_hash),
                format!(
                    "destination '{}' is not a numeric Discord id",
                    mapping.destination_channel_id
                ),
            );
        }
    }

    if !config.mqtt.tls {
        if config.mqtt.tls_insecure {
            result.push(
                Severity::Warning,
                "MQTT_TLS_INSECURE",
                "MQTT_TLS_INSECURE has no effect without MQTT_TLS",
            );
        }
        if config.mqtt.ca_cert_path.is_some() {
            result.push(
                Severity::Warning,
                "MQTT_CA_CERT",
                "MQTT_CA_CERT has no effect without MQTT_TLS",
            );
        }
    } else if config.mqtt.tls_insecure {
        result.push(
            Severity::Warning,
            "MQTT_TLS_INSECURE",
            "broker certificate verification is disabled",
        );
    }

    if let Some(path) = &config.mqtt.ca_cert_path
        && config.mqtt.tls
        && !path.exists()
    {
        result.push(
            Severity::Warning,
            "MQTT_CA_CERT",
            format!("CA certificate {} does not exist", path.display()),
        );
    }

    if config.relay.dedupe_seconds < MIN_DEDUPE_SECONDS {
        result.push(
            Severity::Info,
            "RELAY_DEDUPE_SECONDS",
            format!(
                "dedupe window {}s is raised to the {MIN_DEDUPE_SECONDS}s minimum",
                config.relay.dedupe_seconds
            ),
        );
    }

    result
}

fn is_snowflake(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}
