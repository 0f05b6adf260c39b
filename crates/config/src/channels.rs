//! Channel mapping: mesh channel hash → destination chat channel.

use std::collections::HashMap;

use {
    meshrelay_common::hex::normalize_hex,
    meshrelay_meshcore::channel_hash_hex,
    serde_json::{Map, Value},
    tracing::warn,
};

/// One configured mesh channel.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelMapping {
    pub name: String,
    /// Lowercase hex, unique within a [`ChannelMap`].
    pub channel_hash: String,
    pub destination_channel_id: String,
    /// Normalized secret when the hash was derived from one.
    pub secret: Option<String>,
}

impl std::fmt::Debug for ChannelMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelMapping")
            .field("name", &self.name)
            .field("channel_hash", &self.channel_hash)
            .field("destination_channel_id", &self.destination_channel_id)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Mappings keyed by channel hash, in insertion order.
///
/// The first mapping for a hash wins; later duplicates are rejected.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    entries: Vec<ChannelMapping>,
    index: HashMap<String, usize>,
}

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `mapping`, handing it back if its hash is already present.
    pub fn insert(&mut self, mut mapping: ChannelMapping) -> Result<(), ChannelMapping> {
        mapping.channel_hash = mapping.channel_hash.to_ascii_lowercase();
        if self.index.contains_key(&mapping.channel_hash) {
            return Err(mapping);
        }
        self.index
            .insert(mapping.channel_hash.clone(), self.entries.len());
        self.entries.push(mapping);
        Ok(())
    }

    /// Case-insensitive lookup.
    pub fn get(&self, channel_hash: &str) -> Option<&ChannelMapping> {
        let key = channel_hash.to_ascii_lowercase();
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelMapping> {
        self.entries.iter()
    }
}

impl FromIterator<ChannelMapping> for ChannelMap {
    fn from_iter<I: IntoIterator<Item = ChannelMapping>>(iter: I) -> Self {
        let mut map = Self::new();
        for mapping in iter {
            let _ = map.insert(mapping);
        }
        map
    }
}

/// Parsed mapping document, before validation of individual entries.
#[derive(Debug, Clone, Default)]
pub struct ChannelsFile {
    pub default_channel_id: Option<String>,
    pub channels: Vec<Value>,
}

impl ChannelsFile {
    /// Pull the known top-level fields out of a parsed document.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        Self {
            default_channel_id: first_text(obj, &["default_channel_id", "defaultChannelId"]),
            channels: obj
                .get("channels")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// Validated mappings plus the secrets to hand to the decoder.
#[derive(Debug, Clone, Default)]
pub struct ChannelSet {
    pub map: ChannelMap,
    pub secrets: Vec<String>,
}

/// Validate mapping entries, skipping bad ones with a warning.
///
/// Entries need a destination id and either a secret or a hash override; a
/// secret takes precedence. Secrets are collected for the key store even when
/// their hash duplicates an earlier entry.
pub fn build_channel_set(entries: &[Value]) -> ChannelSet {
    let mut set = ChannelSet::default();

    for entry in entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };

        let Some(destination_channel_id) =
            first_text(obj, &["discord_channel_id", "discordChannelId"])
        else {
            warn!("channel entry missing discord_channel_id, skipping");
            continue;
        };

        let secret = normalize_hex(&first_text(obj, &["secret"]).unwrap_or_default());
        let hash_override = normalize_hex(&first_text(obj, &["hash"]).unwrap_or_default());
        let name = first_text(obj, &["name", "label"]).unwrap_or_default();

        let channel_hash = if !secret.is_empty() {
            let hash = channel_hash_hex(&secret);
            set.secrets.push(secret.clone());
            hash
        } else if !hash_override.is_empty() {
            Some(hash_override)
        } else {
            None
        };

        let Some(channel_hash) = channel_hash else {
            warn!(
                channel_id = %destination_channel_id,
                "channel entry missing secret/hash, skipping"
            );
            continue;
        };

        let mapping = ChannelMapping {
            name,
            channel_hash,
            destination_channel_id,
            secret: (!secret.is_empty()).then_some(secret),
        };
        if let Err(dup) = set.map.insert(mapping) {
            warn!(
                channel_hash = %dup.channel_hash,
                "duplicate channel hash, keeping first mapping"
            );
        }
    }

    set
}

/// First non-empty string (trimmed) or non-zero number among `keys`.
fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    })
}
