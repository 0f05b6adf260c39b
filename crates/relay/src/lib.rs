//! The relay core.
//!
//! One inbound transport message goes through
//! extract → decode → filter → dedupe → route → format → send,
//! and may be dropped at any step. [`RelayPipeline`] drives the sequence;
//! the other modules are the individual steps.

pub mod dedupe;
pub mod extract;
pub mod format;
pub mod pipeline;
pub mod router;

pub use {
    dedupe::{DedupeCache, dedupe_key},
    extract::{EncodingHint, PacketBlob, extract},
    format::format_message,
    pipeline::{Clock, DropReason, Outcome, RelayPipeline, SystemClock},
    router::{ChannelRouter, RoutingDecision},
};
