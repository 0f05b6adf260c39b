use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

#[cfg(feature = "metrics")]
use meshrelay_metrics::{channels as ch_metrics, counter};

use crate::{
    Result,
    plugin::{ChannelResolver, ChatChannel},
};

/// Resolved destination channels, keyed by platform channel id.
///
/// Only successful lookups of text channels are kept. Failures and non-text
/// channels go back to the platform on the next request.
pub struct ChannelCache {
    resolver: Arc<dyn ChannelResolver>,
    channels: RwLock<HashMap<String, Arc<dyn ChatChannel>>>,
}

impl ChannelCache {
    pub fn new(resolver: Arc<dyn ChannelResolver>) -> Self {
        Self {
            resolver,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Cached channel for `id`, resolving it on first use.
    pub async fn get(&self, id: &str) -> Result<Option<Arc<dyn ChatChannel>>> {
        if let Some(channel) = self.channels.read().await.get(id) {
            #[cfg(feature = "metrics")]
            counter!(ch_metrics::CACHE_HITS_TOTAL).increment(1);
            return Ok(Some(Arc::clone(channel)));
        }

        #[cfg(feature = "metrics")]
        counter!(ch_metrics::RESOLVES_TOTAL).increment(1);

        let Some(channel) = self.resolver.resolve_channel(id).await? else {
            return Ok(None);
        };

        // Two concurrent misses may both resolve; the first insert wins.
        let mut channels = self.channels.write().await;
        let channel = channels
            .entry(id.to_string())
            .or_insert(channel)
            .clone();
        Ok(Some(channel))
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.channels.read().await.is_empty()
    }

    pub fn platform(&self) -> &str {
        self.resolver.platform()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::Error,
        async_trait::async_trait,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    struct FixedChannel(String);

    #[async_trait]
    impl ChatChannel for FixedChannel {
        fn id(&self) -> &str {
            &self.0
        }

        async fn send(&self, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    /// "text-*" ids resolve, "voice-*" ids are not text, anything else fails.
    #[derive(Default)]
    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChannelResolver for CountingResolver {
        fn platform(&self) -> &str {
            "test"
        }

        async fn resolve_channel(&self, id: &str) -> Result<Option<Arc<dyn ChatChannel>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if id.starts_with("text-") {
                Ok(Some(Arc::new(FixedChannel(id.to_string()))))
            } else if id.starts_with("voice-") {
                Ok(None)
            } else {
                Err(Error::unavailable("lookup failed"))
            }
        }
    }

    #[tokio::test]
    async fn resolves_once_per_text_channel() {
        let resolver = Arc::new(CountingResolver::default());
        let cache = ChannelCache::new(resolver.clone());

        let first = cache.get("text-1").await.unwrap().unwrap();
        let second = cache.get("text-1").await.unwrap().unwrap();
        assert_eq!(first.id(), "text-1");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn non_text_channels_are_not_cached() {
        let resolver = Arc::new(CountingResolver::default());
        let cache = ChannelCache::new(resolver.clone());

        assert!(cache.get("voice-1").await.unwrap().is_none());
        assert!(cache.get("voice-1").await.unwrap().is_none());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn failures_are_retried() {
        let resolver = Arc::new(CountingResolver::default());
        let cache = ChannelCache::new(resolver.clone());

        assert!(cache.get("missing").await.is_err());
        assert!(cache.get("missing").await.is_err());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.platform(), "test");
    }
}
