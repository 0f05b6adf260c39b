use std::path::{Path, PathBuf};

use secrecy::Secret;

use crate::{
    channels::{ChannelsFile, build_channel_set},
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::{
        DiscordConfig, MetricsConfig, MqttConfig, Qos, RelayConfig, RelaySettings,
        TransportMode,
    },
};

/// Mapping document used when `CHANNELS_FILE` is unset.
pub const DEFAULT_CHANNELS_FILE: &str = "channels.json";

/// Load configuration from the process environment.
///
/// `channels_file` overrides `CHANNELS_FILE` when given.
pub fn load_config(channels_file: Option<PathBuf>) -> RelayConfig {
    load_config_with(|name| std::env::var(name).ok(), channels_file)
}

/// Load configuration using a custom variable lookup.
///
/// This is the implementation used by [`load_config`]; the separate
/// signature makes it testable without mutating the process environment.
pub fn load_config_with(
    lookup: impl Fn(&str) -> Option<String>,
    channels_file: Option<PathBuf>,
) -> RelayConfig {
    let env = Env(&lookup);

    let channels_file = channels_file
        .unwrap_or_else(|| PathBuf::from(env.string("CHANNELS_FILE", DEFAULT_CHANNELS_FILE)));
    let (file, channels_file_error) = match read_channels_file(&channels_file) {
        Ok(file) => (file, None),
        Err(e) => (ChannelsFile::default(), Some(e.to_string())),
    };
    let set = build_channel_set(&file.channels);

    let default_channel_id = match lookup("DISCORD_DEFAULT_CHANNEL_ID") {
        Some(value) => value,
        None => file.default_channel_id.unwrap_or_default(),
    };

    let defaults = MqttConfig::default();
    let mqtt = MqttConfig {
        host: env.string("MQTT_HOST", &defaults.host),
        port: env
            .int("MQTT_PORT")
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(defaults.port),
        topic: env.string("MQTT_TOPIC", &defaults.topic),
        transport: TransportMode::parse(&env.string("MQTT_TRANSPORT", "tcp")),
        ws_path: env.string("MQTT_WS_PATH", &defaults.ws_path),
        tls: env.bool("MQTT_TLS"),
        tls_insecure: env.bool("MQTT_TLS_INSECURE"),
        ca_cert_path: env.non_empty("MQTT_CA_CERT").map(PathBuf::from),
        client_id: env.non_empty("MQTT_CLIENT_ID"),
        username: env.non_empty("MQTT_USERNAME"),
        password: env.non_empty("MQTT_PASSWORD").map(Secret::new),
        qos: Qos::from_level(env.int("MQTT_QOS").unwrap_or(0)),
    };

    let relay = RelaySettings {
        dedupe_seconds: env
            .int("RELAY_DEDUPE_SECONDS")
            .map(|s| u64::try_from(s).unwrap_or(0))
            .unwrap_or(RelaySettings::default().dedupe_seconds),
    };

    let discord = DiscordConfig {
        token: Secret::new(env.string("DISCORD_TOKEN", "").trim().to_string()),
        default_channel_id: Some(default_channel_id.trim().to_string()).filter(|s| !s.is_empty()),
    };

    let metrics = MetricsConfig {
        listen: env.non_empty("METRICS_LISTEN"),
    };

    RelayConfig {
        mqtt,
        relay,
        discord,
        metrics,
        channels_file,
        channels_file_error,
        channels: set.map,
        channel_secrets: set.secrets,
    }
}

/// Read the channel mapping document. A missing file is an empty mapping.
///
/// An unreadable or unparseable file is an error; [`load_config_with`] keeps
/// it on the config so validation can report it.
pub fn read_channels_file(path: &Path) -> Result<ChannelsFile> {
    if !path.exists() {
        return Ok(ChannelsFile::default());
    }
    let value = load_channels_value(path)?;
    Ok(ChannelsFile::from_value(&value))
}

/// Load and parse the mapping document with env substitution.
pub fn load_channels_value(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_channels_value(&raw, path)
}

fn parse_channels_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        _ => serde_json::from_str(raw).map_err(Error::from),
    }
}

/// Typed accessors over a variable lookup.
struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Raw value, or `fallback` when unset.
    fn string(&self, name: &str, fallback: &str) -> String {
        (self.0)(name).unwrap_or_else(|| fallback.to_string())
    }

    /// Trimmed value, `None` when unset or blank.
    fn non_empty(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// `1`, `true`, `yes`, `on` (any case) are true; everything else is false.
    fn bool(&self, name: &str) -> bool {
        self.non_empty(name).is_some_and(|v| {
            matches!(
                v.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    /// Decimal integer, `None` when unset or unparseable.
    fn int(&self, name: &str) -> Option<i64> {
        self.non_empty(name).and_then(|v| v.parse().ok())
    }
}
