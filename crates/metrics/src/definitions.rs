//! Metric name and label definitions.
//!
//! All metric names emitted by the relay live here so the exported surface is
//! documented in one place.

/// Relay pipeline metrics
pub mod relay {
    /// Transport messages handed to the pipeline
    pub const PACKETS_RECEIVED_TOTAL: &str = "meshrelay_packets_received_total";
    /// Messages dropped before delivery, labelled by `reason`
    pub const PACKETS_DROPPED_TOTAL: &str = "meshrelay_packets_dropped_total";
    /// Messages delivered to a chat channel
    pub const MESSAGES_RELAYED_TOTAL: &str = "meshrelay_messages_relayed_total";
    /// Sends that failed at the chat platform
    pub const SEND_FAILURES_TOTAL: &str = "meshrelay_send_failures_total";
    /// Time spent handling one message, in seconds
    pub const HANDLE_DURATION_SECONDS: &str = "meshrelay_handle_duration_seconds";
}

/// Dedupe cache metrics
pub mod dedupe {
    /// Entries currently held by the dedupe cache
    pub const ENTRIES: &str = "meshrelay_dedupe_entries";
    /// Entries removed by the periodic sweep
    pub const EVICTED_TOTAL: &str = "meshrelay_dedupe_evicted_total";
}

/// Transport metrics
pub mod mqtt {
    /// Successful broker connections (including reconnects)
    pub const CONNECTIONS_TOTAL: &str = "meshrelay_mqtt_connections_total";
    /// Event loop errors that triggered a reconnect
    pub const CONNECTION_ERRORS_TOTAL: &str = "meshrelay_mqtt_connection_errors_total";
}

/// Chat channel metrics
pub mod channels {
    /// Channel lookups that hit the resolution cache
    pub const CACHE_HITS_TOTAL: &str = "meshrelay_channel_cache_hits_total";
    /// Channel lookups that went to the platform
    pub const RESOLVES_TOTAL: &str = "meshrelay_channel_resolves_total";
}

/// Common label keys
pub mod labels {
    pub const REASON: &str = "reason";
    pub const CHANNEL: &str = "channel";
}

/// Histogram buckets
pub mod buckets {
    /// Handle latency: mostly a single HTTP round trip to the chat platform.
    pub const HANDLE_DURATION: [f64; 10] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];
}
