use std::{collections::HashMap, sync::Mutex, time::Duration};

#[cfg(feature = "metrics")]
use meshrelay_metrics::{counter, dedupe as dedupe_metrics, gauge};

/// Shortest window the cache will use.
pub const MIN_WINDOW_MILLIS: u64 = 5_000;
/// Shortest period between sweeps.
pub const MIN_SWEEP_MILLIS: u64 = 10_000;

/// Remembers recently relayed message identities.
///
/// A key is suppressed while it was last relayed less than the window ago.
/// Suppressed sightings do not extend the window, so a message repeated
/// continuously is still relayed once per window. Entries older than the
/// window are removed by [`sweep`](Self::sweep).
#[derive(Debug)]
pub struct DedupeCache {
    window_millis: u64,
    entries: Mutex<HashMap<String, u64>>,
}

impl DedupeCache {
    /// Cache with a window of `dedupe_seconds`, raised to 5 seconds.
    pub fn new(dedupe_seconds: u64) -> Self {
        Self {
            window_millis: dedupe_seconds
                .saturating_mul(1_000)
                .max(MIN_WINDOW_MILLIS),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn window_millis(&self) -> u64 {
        self.window_millis
    }

    /// How often [`sweep`](Self::sweep) should run.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.window_millis.max(MIN_SWEEP_MILLIS))
    }

    /// `true` when `key` should be relayed now; records `now_millis` if so.
    pub fn should_relay(&self, key: &str, now_millis: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let suppressed = entries
            .get(key)
            .is_some_and(|&prior| now_millis.saturating_sub(prior) < self.window_millis);
        if !suppressed {
            entries.insert(key.to_string(), now_millis);
            #[cfg(feature = "metrics")]
            gauge!(dedupe_metrics::ENTRIES).set(entries.len() as f64);
        }
        !suppressed
    }

    /// Drop entries last relayed more than the window before `now_millis`.
    /// Returns how many were removed.
    pub fn sweep(&self, now_millis: u64) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, &mut seen| now_millis.saturating_sub(seen) <= self.window_millis);
        let removed = before - entries.len();

        #[cfg(feature = "metrics")]
        {
            gauge!(dedupe_metrics::ENTRIES).set(entries.len() as f64);
            counter!(dedupe_metrics::EVICTED_TOTAL).increment(removed as u64);
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identity of a relayed message on a channel.
///
/// Prefers the packet's message hash, then the sender timestamp, then the
/// literal `no-hash`. Two different messages with no hash and the same
/// timestamp on the same channel therefore collide.
pub fn dedupe_key(message_hash: Option<&str>, timestamp: Option<u32>, channel_hash: &str) -> String {
    let identity = match (
        message_hash.filter(|h| !h.is_empty()),
        timestamp.filter(|&t| t != 0),
    ) {
        (Some(hash), _) => hash.to_string(),
        (None, Some(ts)) => ts.to_string(),
        (None, None) => "no-hash".to_string(),
    };
    format!("{identity}:{channel_hash}")
}
