//! Chat-platform capability.
//!
//! The relay only needs two things from a chat platform: resolve a
//! destination channel by id, and send text to it. Each platform (Discord
//! today) implements [`ChannelResolver`] and [`ChatChannel`].

pub mod error;
pub mod plugin;
pub mod registry;

pub use {
    error::{Error, Result},
    plugin::{ChannelResolver, ChatChannel},
    registry::ChannelCache,
};
