use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    meshrelay_channels::ChannelCache,
    meshrelay_common::TransportMessage,
    meshrelay_meshcore::{KeyStore, PacketDecoder, PayloadType},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use meshrelay_metrics::{counter, histogram, labels, relay as relay_metrics};

use crate::{
    dedupe::{DedupeCache, dedupe_key},
    extract::extract,
    format::format_message,
    router::ChannelRouter,
};

/// Wall-clock source for dedupe timestamps.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// Why a message was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No packet could be located in the payload.
    NoPacket,
    DecodeFailed,
    /// Decoded, but not group text.
    NotGroupText,
    /// Group text without a usable key.
    Encrypted,
    Duplicate,
    NoDestination,
    /// The destination channel could not be fetched or is not text.
    ChannelUnavailable,
    EmptyMessage,
    SendFailed,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoPacket => "no_packet",
            Self::DecodeFailed => "decode_failed",
            Self::NotGroupText => "not_group_text",
            Self::Encrypted => "encrypted",
            Self::Duplicate => "duplicate",
            Self::NoDestination => "no_destination",
            Self::ChannelUnavailable => "channel_unavailable",
            Self::EmptyMessage => "empty_message",
            Self::SendFailed => "send_failed",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handling one transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered { channel_id: String },
    Dropped(DropReason),
}

/// Drives one transport message from payload to chat channel.
///
/// All state shared between messages (dedupe entries, resolved channels) is
/// owned here and safe to use from concurrent tasks.
pub struct RelayPipeline {
    decoder: Arc<dyn PacketDecoder>,
    keys: Option<KeyStore>,
    dedupe: Arc<DedupeCache>,
    router: ChannelRouter,
    channels: ChannelCache,
    clock: Arc<dyn Clock>,
}

impl RelayPipeline {
    /// An empty key store is treated as no key store.
    pub fn new(
        decoder: Arc<dyn PacketDecoder>,
        keys: KeyStore,
        dedupe: Arc<DedupeCache>,
        router: ChannelRouter,
        channels: ChannelCache,
    ) -> Self {
        Self {
            decoder,
            keys: (!keys.is_empty()).then_some(keys),
            dedupe,
            router,
            channels,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dedupe(&self) -> &Arc<DedupeCache> {
        &self.dedupe
    }

    pub fn router(&self) -> &ChannelRouter {
        &self.router
    }

    /// Handle one message. Never fails; every problem becomes a drop.
    pub async fn handle(&self, message: &TransportMessage) -> Outcome {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::PACKETS_RECEIVED_TOTAL).increment(1);

        let outcome = match self.run(message).await {
            Ok(channel_id) => Outcome::Delivered { channel_id },
            Err(reason) => Outcome::Dropped(reason),
        };

        #[cfg(feature = "metrics")]
        {
            match &outcome {
                Outcome::Delivered { .. } => {
                    counter!(relay_metrics::MESSAGES_RELAYED_TOTAL).increment(1);
                },
                Outcome::Dropped(reason) => {
                    counter!(relay_metrics::PACKETS_DROPPED_TOTAL, labels::REASON => reason.as_str())
                        .increment(1);
                },
            }
            histogram!(relay_metrics::HANDLE_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());
        }

        outcome
    }

    async fn run(&self, message: &TransportMessage) -> Result<String, DropReason> {
        let topic = message.topic.as_str();

        let blob = extract(topic, &message.payload).ok_or(DropReason::NoPacket)?;

        let packet = self
            .decoder
            .decode(&blob.hex, self.keys.as_ref())
            .map_err(|e| {
                debug!(topic, source_path = %blob.source_path, error = %e, "decode failed");
                DropReason::DecodeFailed
            })?;

        if packet.payload_type != PayloadType::GroupText {
            return Err(DropReason::NotGroupText);
        }

        let message_hash = packet.message_hash.as_deref();
        let Some(group) = packet.payload.decoded.as_ref() else {
            debug!(message_hash = message_hash.unwrap_or("no-hash"), "group text without payload");
            return Err(DropReason::Encrypted);
        };
        let Some(decrypted) = group
            .decrypted
            .as_ref()
            .filter(|d| d.message.as_deref().is_some_and(|m| !m.is_empty()))
        else {
            debug!(
                message_hash = message_hash.unwrap_or("no-hash"),
                channel_hash = %group.channel_hash,
                "encrypted group text (no key)"
            );
            return Err(DropReason::Encrypted);
        };

        let channel_hash = group.channel_hash.to_ascii_lowercase();
        let key = dedupe_key(message_hash, decrypted.timestamp, &channel_hash);
        if !self.dedupe.should_relay(&key, self.clock.now_millis()) {
            debug!(key = %key, "duplicate message suppressed");
            return Err(DropReason::Duplicate);
        }

        let decision = self.router.route(&channel_hash);
        let Some(channel_id) = decision.destination_channel_id else {
            debug!(
                channel_hash = if channel_hash.is_empty() { "unknown" } else { channel_hash.as_str() },
                "no destination channel for hash"
            );
            return Err(DropReason::NoDestination);
        };

        let channel = match self.channels.get(channel_id).await {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                warn!(channel_id, "destination channel is not a text channel");
                return Err(DropReason::ChannelUnavailable);
            },
            Err(e) => {
                warn!(channel_id, error = %e, "failed to fetch destination channel");
                return Err(DropReason::ChannelUnavailable);
            },
        };

        let text = format_message(decision.mapping, group).ok_or(DropReason::EmptyMessage)?;

        if let Err(e) = channel.send(&text).await {
            warn!(channel_id, error = %e, "failed to send message");
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::SEND_FAILURES_TOTAL, labels::CHANNEL => channel_id.to_string())
                .increment(1);
            return Err(DropReason::SendFailed);
        }

        debug!(channel_id, channel_hash = %channel_hash, "relayed message");
        Ok(channel_id.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        meshrelay_channels::{ChannelResolver, ChatChannel},
        meshrelay_config::{ChannelMap, ChannelMapping},
        meshrelay_meshcore::{
            DecodeError, DecodedPacket, DecryptedMessage, GroupText, PacketPayload, RouteType,
        },
        std::sync::{
            Mutex,
            atomic::{AtomicU64, Ordering},
        },
    };

    const HEX: &str = "15000102030405060708090a0b0c0d0e0f101112";

    /// Returns a fixed result for every input.
    struct StubDecoder(Mutex<Option<DecodedPacket>>);

    impl StubDecoder {
        fn returning(packet: Option<DecodedPacket>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(packet)))
        }
    }

    impl PacketDecoder for StubDecoder {
        fn decode(
            &self,
            _hex: &str,
            _keys: Option<&KeyStore>,
        ) -> meshrelay_meshcore::Result<DecodedPacket> {
            self.0
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| DecodeError::malformed("stub", "no packet"))
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    struct RecordingChannel {
        id: String,
        recorder: Arc<Recorder>,
    }

    #[async_trait]
    impl ChatChannel for RecordingChannel {
        fn id(&self) -> &str {
            &self.id
        }

        async fn send(&self, text: &str) -> meshrelay_channels::Result<()> {
            if self.recorder.fail {
                return Err(meshrelay_channels::Error::unavailable("send rejected"));
            }
            self.recorder
                .sent
                .lock()
                .unwrap()
                .push((self.id.clone(), text.to_string()));
            Ok(())
        }
    }

    /// Every id except "voice" resolves to a recording channel.
    struct RecordingResolver(Arc<Recorder>);

    #[async_trait]
    impl ChannelResolver for RecordingResolver {
        fn platform(&self) -> &str {
            "test"
        }

        async fn resolve_channel(
            &self,
            id: &str,
        ) -> meshrelay_channels::Result<Option<Arc<dyn ChatChannel>>> {
            if id == "voice" {
                return Ok(None);
            }
            Ok(Some(Arc::new(RecordingChannel {
                id: id.to_string(),
                recorder: Arc::clone(&self.0),
            })))
        }
    }

    struct ManualClock(AtomicU64);

    impl Clock for ManualClock {
        fn now_millis(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn group_packet(hash: Option<&str>, sender: Option<&str>, message: Option<&str>) -> DecodedPacket {
        DecodedPacket {
            route_type: RouteType::Flood,
            payload_type: PayloadType::GroupText,
            version: 0,
            transport_codes: None,
            path: Vec::new(),
            message_hash: hash.map(Into::into),
            payload: PacketPayload {
                raw: Vec::new(),
                decoded: Some(GroupText {
                    channel_hash: "AB".into(),
                    cipher_mac: "0000".into(),
                    ciphertext: Vec::new(),
                    decrypted: message.map(|m| DecryptedMessage {
                        timestamp: Some(1_700_000_000),
                        flags: 0,
                        sender: sender.map(Into::into),
                        message: Some(m.into()),
                    }),
                }),
            },
        }
    }

    struct Harness {
        pipeline: RelayPipeline,
        recorder: Arc<Recorder>,
        clock: Arc<ManualClock>,
    }

    fn harness(packet: Option<DecodedPacket>, default: Option<&str>, fail: bool) -> Harness {
        let recorder = Arc::new(Recorder {
            fail,
            ..Default::default()
        });
        let mappings: ChannelMap = [ChannelMapping {
            name: "ops".into(),
            channel_hash: "ab".into(),
            destination_channel_id: "123".into(),
            secret: None,
        }]
        .into_iter()
        .collect();
        let clock = Arc::new(ManualClock(AtomicU64::new(1_000_000)));
        let pipeline = RelayPipeline::new(
            StubDecoder::returning(packet),
            KeyStore::new(Vec::<String>::new()),
            Arc::new(DedupeCache::new(45)),
            ChannelRouter::new(mappings, default.map(Into::into)),
            ChannelCache::new(Arc::new(RecordingResolver(Arc::clone(&recorder)))),
        )
        .with_clock(clock.clone());
        Harness {
            pipeline,
            recorder,
            clock,
        }
    }

    fn message() -> TransportMessage {
        TransportMessage::new("meshcore/rx", format!(r#"{{"hex":"{HEX}"}}"#))
    }

    fn sent(h: &Harness) -> Vec<(String, String)> {
        h.recorder.sent.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn delivers_mapped_message() {
        let h = harness(
            Some(group_packet(Some("AA11"), Some("alice"), Some("hello"))),
            None,
            false,
        );
        let outcome = h.pipeline.handle(&message()).await;
        assert_eq!(outcome, Outcome::Delivered {
            channel_id: "123".into()
        });
        assert_eq!(sent(&h), vec![(
            "123".to_string(),
            "[MeshCore #ops] alice: hello".to_string()
        )]);
    }

    #[tokio::test]
    async fn duplicate_within_window_then_again_after() {
        let h = harness(
            Some(group_packet(Some("AA11"), None, Some("hello"))),
            None,
            false,
        );
        assert!(matches!(h.pipeline.handle(&message()).await, Outcome::Delivered { .. }));
        assert_eq!(
            h.pipeline.handle(&message()).await,
            Outcome::Dropped(DropReason::Duplicate)
        );

        h.clock.0.fetch_add(45_001, Ordering::SeqCst);
        assert!(matches!(h.pipeline.handle(&message()).await, Outcome::Delivered { .. }));
        assert_eq!(sent(&h).len(), 2);
    }

    #[tokio::test]
    async fn payload_without_packet() {
        let h = harness(None, Some("999"), false);
        let msg = TransportMessage::new("meshcore/status", r#"{"battery":90}"#);
        assert_eq!(
            h.pipeline.handle(&msg).await,
            Outcome::Dropped(DropReason::NoPacket)
        );
    }

    #[tokio::test]
    async fn decode_failure() {
        let h = harness(None, Some("999"), false);
        assert_eq!(
            h.pipeline.handle(&message()).await,
            Outcome::Dropped(DropReason::DecodeFailed)
        );
    }

    #[tokio::test]
    async fn other_payload_types_are_ignored() {
        let mut packet = group_packet(Some("AA11"), None, Some("hello"));
        packet.payload_type = PayloadType::Advert;
        let h = harness(Some(packet), Some("999"), false);
        assert_eq!(
            h.pipeline.handle(&message()).await,
            Outcome::Dropped(DropReason::NotGroupText)
        );
        assert!(sent(&h).is_empty());
    }

    #[tokio::test]
    async fn undecrypted_group_text() {
        let h = harness(Some(group_packet(Some("AA11"), None, None)), Some("999"), false);
        assert_eq!(
            h.pipeline.handle(&message()).await,
            Outcome::Dropped(DropReason::Encrypted)
        );
    }

    #[tokio::test]
    async fn unmapped_hash_without_default() {
        let mut packet = group_packet(Some("AA11"), None, Some("hello"));
        if let Some(group) = packet.payload.decoded.as_mut() {
            group.channel_hash = "cd".into();
        }
        let h = harness(Some(packet), None, false);
        assert_eq!(
            h.pipeline.handle(&message()).await,
            Outcome::Dropped(DropReason::NoDestination)
        );
    }

    #[tokio::test]
    async fn unmapped_hash_goes_to_default() {
        let mut packet = group_packet(None, Some("bob"), Some("hi"));
        if let Some(group) = packet.payload.decoded.as_mut() {
            group.channel_hash = "cd".into();
        }
        let h = harness(Some(packet), Some("999"), false);
        h.pipeline.handle(&message()).await;
        assert_eq!(sent(&h), vec![(
            "999".to_string(),
            "[MeshCore unknown] bob: hi".to_string()
        )]);
    }

    #[tokio::test]
    async fn non_text_destination() {
        let mut packet = group_packet(Some("AA11"), None, Some("hello"));
        if let Some(group) = packet.payload.decoded.as_mut() {
            group.channel_hash = "cd".into();
        }
        let h = harness(Some(packet), Some("voice"), false);
        assert_eq!(
            h.pipeline.handle(&message()).await,
            Outcome::Dropped(DropReason::ChannelUnavailable)
        );
    }

    #[tokio::test]
    async fn whitespace_body_is_dropped() {
        let h = harness(Some(group_packet(Some("AA11"), None, Some("   "))), None, false);
        assert_eq!(
            h.pipeline.handle(&message()).await,
            Outcome::Dropped(DropReason::EmptyMessage)
        );
        assert!(sent(&h).is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_contained() {
        let h = harness(
            Some(group_packet(Some("AA11"), None, Some("hello"))),
            None,
            true,
        );
        assert_eq!(
            h.pipeline.handle(&message()).await,
            Outcome::Dropped(DropReason::SendFailed)
        );
    }

    #[test]
    fn empty_key_store_is_dropped() {
        let h = harness(None, None, false);
        assert!(h.pipeline.keys.is_none());
        assert!(SystemClock.now_millis() > 0);
        assert_eq!(DropReason::NoDestination.to_string(), "no_destination");
    }
}
