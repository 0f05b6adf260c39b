//! Discord destination.
//!
//! Uses serenity's REST client only: the relay never reads from Discord, so
//! no gateway connection is opened.

pub mod error;
pub mod outbound;

pub use {
    error::{Error, Result},
    outbound::{DiscordDestination, DiscordTextChannel},
};
