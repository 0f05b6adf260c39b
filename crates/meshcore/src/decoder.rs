use crate::{crypto::KeyStore, error::Result, packet::DecodedPacket};

/// Decodes a hex packet blob into a [`DecodedPacket`].
///
/// The relay pipeline only depends on this trait, so tests can substitute a
/// canned decoder.
pub trait PacketDecoder: Send + Sync {
    fn decode(&self, hex: &str, keys: Option<&KeyStore>) -> Result<DecodedPacket>;
}

/// Decoder for the MeshCore over-the-air packet format.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshCoreDecoder;

impl PacketDecoder for MeshCoreDecoder {
    fn decode(&self, hex: &str, keys: Option<&KeyStore>) -> Result<DecodedPacket> {
        crate::packet::decode_packet(hex, keys)
    }
}
