use bytes::Bytes;

/// One delivery from the pub/sub transport.
///
/// Produced once per inbound publish and consumed by a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl TransportMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}
