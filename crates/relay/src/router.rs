use meshrelay_config::{ChannelMap, ChannelMapping};

/// Where a message for a given channel hash goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingDecision<'a> {
    /// `None` means the message has nowhere to go and is dropped.
    pub destination_channel_id: Option<&'a str>,
    pub mapping: Option<&'a ChannelMapping>,
}

/// Maps mesh channel hashes to destination channel ids.
#[derive(Debug, Clone, Default)]
pub struct ChannelRouter {
    mappings: ChannelMap,
    default_channel_id: Option<String>,
}

impl ChannelRouter {
    pub fn new(mappings: ChannelMap, default_channel_id: Option<String>) -> Self {
        Self {
            mappings,
            default_channel_id: default_channel_id.filter(|id| !id.is_empty()),
        }
    }

    /// Mapped destination for `channel_hash` (any case), else the default.
    pub fn route(&self, channel_hash: &str) -> RoutingDecision<'_> {
        let mapping = self.mappings.get(&channel_hash.to_ascii_lowercase());
        let destination_channel_id = mapping
            .map(|m| m.destination_channel_id.as_str())
            .or(self.default_channel_id.as_deref());
        RoutingDecision {
            destination_channel_id,
            mapping,
        }
    }

    pub fn mappings(&self) -> &ChannelMap {
        &self.mappings
    }

    pub fn default_channel_id(&self) -> Option<&str> {
        self.default_channel_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings() -> ChannelMap {
        [ChannelMapping {
            name: "ops".into(),
            channel_hash: "ab".into(),
            destination_channel_id: "123".into(),
            secret: None,
        }]
        .into_iter()
        .collect()
    }

    #[test]
    fn mapped_hash_in_any_case() {
        let router = ChannelRouter::new(mappings(), Some("999".into()));
        for hash in ["ab", "AB", "aB"] {
            let decision = router.route(hash);
            assert_eq!(decision.destination_channel_id, Some("123"));
            assert_eq!(decision.mapping.map(|m| m.name.as_str()), Some("ops"));
        }
    }

    #[test]
    fn unmapped_hash_uses_default() {
        let router = ChannelRouter::new(mappings(), Some("999".into()));
        let decision = router.route("cd");
        assert_eq!(decision.destination_channel_id, Some("999"));
        assert!(decision.mapping.is_none());
    }

    #[test]
    fn no_mapping_and_no_default() {
        let router = ChannelRouter::new(mappings(), None);
        assert_eq!(
            router.route("cd"),
            RoutingDecision {
                destination_channel_id: None,
                mapping: None,
            }
        );
    }

    #[test]
    fn empty_default_is_no_default() {
        let router = ChannelRouter::new(ChannelMap::new(), Some(String::new()));
        assert!(router.default_channel_id().is_none());
        assert!(router.route("").destination_channel_id.is_none());
    }
}
