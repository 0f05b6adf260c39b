//! MeshCore packet decoding.
//!
//! Parses the over-the-air packet layout (header, optional transport codes,
//! path, payload), derives the message hash used for deduplication, and
//! decrypts group-channel text when a matching channel secret is available.

pub mod crypto;
pub mod decoder;
pub mod error;
pub mod packet;

pub use {
    crypto::{KeyStore, channel_hash_hex},
    decoder::{MeshCoreDecoder, PacketDecoder},
    error::{DecodeError, Result},
    packet::{DecodedPacket, DecryptedMessage, GroupText, PacketPayload, PayloadType, RouteType},
};
