use sha2::{Digest, Sha256};

use crate::{
    crypto::{self, KeyStore, MAC_LEN},
    error::{DecodeError, Result},
};

/// Number of digest bytes kept for the message hash.
const MESSAGE_HASH_LEN: usize = 8;

/// Longest prefix before `": "` that is still treated as a sender name.
const MAX_SENDER_LEN: usize = 50;

/// How the packet is routed through the mesh (header bits 0-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteType {
    TransportFlood,
    Flood,
    Direct,
    TransportDirect,
}

impl RouteType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::TransportFlood,
            1 => Self::Flood,
            2 => Self::Direct,
            _ => Self::TransportDirect,
        }
    }

    /// Transport routes carry two 16-bit transport codes after the header.
    pub fn has_transport_codes(self) -> bool {
        matches!(self, Self::TransportFlood | Self::TransportDirect)
    }
}

/// Payload type (header bits 2-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Request,
    Response,
    TextMessage,
    Ack,
    Advert,
    GroupText,
    GroupData,
    AnonRequest,
    Path,
    Trace,
    Multipart,
    RawCustom,
    Unknown(u8),
}

impl PayloadType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x0f {
            0x00 => Self::Request,
            0x01 => Self::Response,
            0x02 => Self::TextMessage,
            0x03 => Self::Ack,
            0x04 => Self::Advert,
            0x05 => Self::GroupText,
            0x06 => Self::GroupData,
            0x07 => Self::AnonRequest,
            0x08 => Self::Path,
            0x09 => Self::Trace,
            0x0a => Self::Multipart,
            0x0f => Self::RawCustom,
            other => Self::Unknown(other),
        }
    }
}

/// A fully parsed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    pub route_type: RouteType,
    pub payload_type: PayloadType,
    pub version: u8,
    pub transport_codes: Option<[u16; 2]>,
    pub path: Vec<u8>,
    /// Upper-case hex of the truncated packet digest, when known.
    pub message_hash: Option<String>,
    pub payload: PacketPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketPayload {
    pub raw: Vec<u8>,
    /// Structured view of the payload; only group text is parsed.
    pub decoded: Option<GroupText>,
}

/// Group channel payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupText {
    /// Two lowercase hex digits.
    pub channel_hash: String,
    pub cipher_mac: String,
    pub ciphertext: Vec<u8>,
    /// Present only when a key from the store verified and decrypted it.
    pub decrypted: Option<DecryptedMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecryptedMessage {
    pub timestamp: Option<u32>,
    pub flags: u8,
    pub sender: Option<String>,
    pub message: Option<String>,
}

/// Decode a hex packet, decrypting group text with `keys` when possible.
pub fn decode_packet(hex_blob: &str, keys: Option<&KeyStore>) -> Result<DecodedPacket> {
    let bytes = hex::decode(hex_blob.trim())?;
    let header = *bytes
        .first()
        .ok_or_else(|| DecodeError::truncated("header", 1, 0))?;

    let route_type = RouteType::from_bits(header);
    let payload_type = PayloadType::from_bits(header >> 2);
    let version = (header >> 6) & 0x03;

    let mut cursor = 1;
    let transport_codes = if route_type.has_transport_codes() {
        let codes = take(&bytes, &mut cursor, 4, "transport codes")?;
        Some([
            u16::from_le_bytes([codes[0], codes[1]]),
            u16::from_le_bytes([codes[2], codes[3]]),
        ])
    } else {
        None
    };

    let path_len = take(&bytes, &mut cursor, 1, "path length")?[0];
    let path = take(&bytes, &mut cursor, usize::from(path_len), "path")?.to_vec();
    let raw = bytes[cursor..].to_vec();

    let message_hash = Some(message_hash(payload_type, path_len, &raw));

    let decoded = match payload_type {
        PayloadType::GroupText => Some(decode_group_text(&raw, keys)?),
        _ => None,
    };

    Ok(DecodedPacket {
        route_type,
        payload_type,
        version,
        transport_codes,
        path,
        message_hash,
        payload: PacketPayload { raw, decoded },
    })
}

fn take<'a>(
    bytes: &'a [u8],
    cursor: &mut usize,
    len: usize,
    field: &'static str,
) -> Result<&'a [u8]> {
    let available = bytes.len().saturating_sub(*cursor);
    if available < len {
        return Err(DecodeError::truncated(field, len, available));
    }
    let slice = &bytes[*cursor..*cursor + len];
    *cursor += len;
    Ok(slice)
}

fn payload_type_byte(payload_type: PayloadType) -> u8 {
    match payload_type {
        PayloadType::Request => 0x00,
        PayloadType::Response => 0x01,
        PayloadType::TextMessage => 0x02,
        PayloadType::Ack => 0x03,
        PayloadType::Advert => 0x04,
        PayloadType::GroupText => 0x05,
        PayloadType::GroupData => 0x06,
        PayloadType::AnonRequest => 0x07,
        PayloadType::Path => 0x08,
        PayloadType::Trace => 0x09,
        PayloadType::Multipart => 0x0a,
        PayloadType::RawCustom => 0x0f,
        PayloadType::Unknown(bits) => bits,
    }
}

/// Route-independent identity of a packet, so re-flooded copies hash equal.
fn message_hash(payload_type: PayloadType, path_len: u8, payload: &[u8]) -> String {
    let mut digest = Sha256::new();
    digest.update([payload_type_byte(payload_type)]);
    if payload_type == PayloadType::Trace {
        digest.update([path_len]);
    }
    digest.update(payload);
    hex::encode_upper(&digest.finalize()[..MESSAGE_HASH_LEN])
}

fn decode_group_text(payload: &[u8], keys: Option<&KeyStore>) -> Result<GroupText> {
    if payload.len() < 1 + MAC_LEN {
        return Err(DecodeError::malformed(
            "group text",
            format!("{} bytes is shorter than hash and mac", payload.len()),
        ));
    }
    let hash = payload[0];
    let mac = &payload[1..1 + MAC_LEN];
    let ciphertext = &payload[1 + MAC_LEN..];

    let decrypted = keys.and_then(|store| {
        store
            .candidates(hash)
            .find_map(|secret| crypto::decrypt_group_payload(secret, mac, ciphertext))
            .and_then(|plain| parse_plaintext(&plain))
    });

    Ok(GroupText {
        channel_hash: format!("{hash:02x}"),
        cipher_mac: hex::encode(mac),
        ciphertext: ciphertext.to_vec(),
        decrypted,
    })
}

/// `timestamp u32 LE | flags u8 | "sender: message" NUL-padded`.
fn parse_plaintext(plain: &[u8]) -> Option<DecryptedMessage> {
    if plain.len() < 5 {
        return None;
    }
    let timestamp = u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]);
    let flags = plain[4];
    let body = &plain[5..];
    let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
    let text = String::from_utf8_lossy(&body[..end]).into_owned();

    let (sender, message) = split_sender(&text);
    Some(DecryptedMessage {
        timestamp: (timestamp != 0).then_some(timestamp),
        flags,
        sender,
        message: (!message.is_empty()).then(|| message.to_string()),
    })
}

fn split_sender(text: &str) -> (Option<String>, &str) {
    match text.find(": ") {
        Some(idx) if idx > 0 && idx < MAX_SENDER_LEN => {
            let candidate = &text[..idx];
            if candidate.contains([':', '[', ']']) {
                (None, text)
            } else {
                (Some(candidate.to_string()), &text[idx + 2..])
            }
        },
        _ => (None, text),
    }
}
