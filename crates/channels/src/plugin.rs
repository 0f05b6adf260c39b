use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

/// A resolved destination that accepts text.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Platform channel id.
    fn id(&self) -> &str;

    /// Send a single message.
    async fn send(&self, text: &str) -> Result<()>;
}

/// Looks up destination channels on a chat platform.
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    /// Platform identifier (e.g. "discord").
    fn platform(&self) -> &str;

    /// Fetch channel `id`.
    ///
    /// `Ok(None)` means the channel exists but cannot be used as a text
    /// destination.
    async fn resolve_channel(&self, id: &str) -> Result<Option<Arc<dyn ChatChannel>>>;
}
