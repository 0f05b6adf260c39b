//! Locate an encoded mesh packet inside an arbitrary transport payload.
//!
//! Bridges publish packets in many shapes: JSON telemetry with the packet in
//! some field, a bare hex string, base64, or raw bytes. Each shape has its own
//! classifier; they are tried in a fixed order and the first hit wins.

use std::borrow::Cow;

use {
    base64::{
        Engine as _, alphabet,
        engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    },
    meshrelay_common::hex::is_hex_digits,
    serde_json::{Map, Value},
};

/// Object keys that usually hold the packet; searched before any other key.
const LIKELY_PACKET_KEYS: &[&str] = &[
    "hex",
    "raw",
    "packet",
    "packet_hex",
    "frame",
    "data",
    "payload",
    "mesh_packet",
    "meshcore_packet",
    "rx_packet",
    "bytes",
    "packet_bytes",
];

const MIN_HEX_LEN: usize = 20;
const MIN_BASE64_LEN: usize = 24;
const MIN_PACKET_BYTES: usize = 10;
/// Leading elements of a number array that must all be integers.
const INT_ARRAY_PROBE: usize = 20;
const BINARY_SAMPLE: usize = 200;
const MIN_PRINTABLE_FRACTION: f64 = 0.6;

/// Accepts both alphabets' padding conventions and stray trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// How the packet was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingHint {
    Hex,
    Base64,
    IntArray,
    Binary,
}

/// A located packet, normalized to lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketBlob {
    pub hex: String,
    /// Where the packet was found: `root.packet_hex`, `root.frames[0]`,
    /// `text` or `binary`.
    pub source_path: String,
    pub encoding: EncodingHint,
}

impl PacketBlob {
    fn new(hex: String, source_path: impl Into<String>, encoding: EncodingHint) -> Self {
        Self {
            hex: hex.to_ascii_lowercase(),
            source_path: source_path.into(),
            encoding,
        }
    }
}

/// The payload seen both as bytes and as (lossy) trimmed text.
struct Payload<'a> {
    bytes: &'a [u8],
    text: Cow<'a, str>,
}

type Classifier = fn(&Payload<'_>) -> Option<PacketBlob>;

/// Tried in order; each is independent of the others.
const CLASSIFIERS: [Classifier; 3] = [from_json, from_text, from_binary];

/// Find the packet in `payload`.
///
/// The topic is not consulted today; it is part of the signature so a
/// topic-specific layout can be recognised without changing callers.
pub fn extract(_topic: &str, payload: &[u8]) -> Option<PacketBlob> {
    if payload.is_empty() {
        return None;
    }
    let payload = Payload {
        bytes: payload,
        text: String::from_utf8_lossy(payload),
    };
    CLASSIFIERS
        .iter()
        .find_map(|classify| classify(&payload))
}

fn from_json(payload: &Payload<'_>) -> Option<PacketBlob> {
    let text = payload.text.trim();
    if !(text.starts_with('{') && text.ends_with('}')) {
        return None;
    }
    let value: Value = serde_json::from_str(text).ok()?;
    search(&value, "root")
}

fn from_text(payload: &Payload<'_>) -> Option<PacketBlob> {
    let text = payload.text.trim();
    if text.is_empty() {
        return None;
    }
    string_blob(text, "text")
}

fn from_binary(payload: &Payload<'_>) -> Option<PacketBlob> {
    if payload.bytes.len() < MIN_PACKET_BYTES || !is_probably_binary(payload.bytes) {
        return None;
    }
    Some(PacketBlob::new(
        hex::encode(payload.bytes),
        "binary",
        EncodingHint::Binary,
    ))
}

/// Depth-first search of a parsed document. Nesting is bounded by the JSON
/// parser's recursion limit.
fn search(value: &Value, path: &str) -> Option<PacketBlob> {
    match value {
        Value::String(s) => string_blob(s, path),
        Value::Array(items) => array_blob(items, path).or_else(|| {
            items
                .iter()
                .enumerate()
                .find_map(|(i, item)| search(item, &format!("{path}[{i}]")))
        }),
        Value::Object(map) => search_object(map, path),
        _ => None,
    }
}

fn search_object(map: &Map<String, Value>, path: &str) -> Option<PacketBlob> {
    let mut keys: Vec<&String> = map.keys().collect();
    // Stable: ties keep document order.
    keys.sort_by_key(|key| !LIKELY_PACKET_KEYS.contains(&key.as_str()));

    keys.into_iter().find_map(|key| {
        let child = map.get(key)?;
        let child_path = format!("{path}.{key}");
        match child {
            Value::String(s) => string_blob(s, &child_path),
            Value::Array(_) | Value::Object(_) => search(child, &child_path),
            _ => None,
        }
    })
}

fn string_blob(value: &str, path: &str) -> Option<PacketBlob> {
    let text = value.trim();
    if looks_like_hex(text) {
        return Some(PacketBlob::new(text.to_string(), path, EncodingHint::Hex));
    }
    base64_to_hex(text).map(|hex| PacketBlob::new(hex, path, EncodingHint::Base64))
}

fn array_blob(items: &[Value], path: &str) -> Option<PacketBlob> {
    if items.is_empty() {
        return None;
    }
    let probe = items.len().min(INT_ARRAY_PROBE);
    if !items[..probe].iter().all(is_integer) {
        return None;
    }
    let bytes: Vec<u8> = items.iter().map(as_byte).collect::<Option<_>>()?;
    if bytes.len() < MIN_PACKET_BYTES {
        return None;
    }
    Some(PacketBlob::new(
        hex::encode(bytes),
        path,
        EncodingHint::IntArray,
    ))
}

/// Trimmed, at least 20 characters, even length, hex digits only.
fn looks_like_hex(text: &str) -> bool {
    text.len() >= MIN_HEX_LEN && text.len() % 2 == 0 && is_hex_digits(text)
}

/// Decodes strings that carry a base64 marker character and yield enough
/// bytes to be a packet.
fn base64_to_hex(text: &str) -> Option<String> {
    if text.len() < MIN_BASE64_LEN || !text.contains(['+', '/', '=']) {
        return None;
    }
    // Decoding stops at the first padding character. Anything else outside
    // the alphabet is skipped, with the URL-safe variant folded in.
    let data = text.split('=').next().unwrap_or_default();
    let mut cleaned: String = data
        .chars()
        .filter_map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '+' | '/' => Some(c),
            '-' => Some('+'),
            '_' => Some('/'),
            _ => None,
        })
        .collect();
    // A lone trailing sextet cannot form a byte.
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }
    let raw = LENIENT_BASE64.decode(cleaned).ok()?;
    (raw.len() >= MIN_PACKET_BYTES).then(|| hex::encode(raw))
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        },
        _ => false,
    }
}

fn as_byte(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => {
            let n = n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))?;
            u8::try_from(n).ok()
        },
        _ => None,
    }
}

/// Fewer than 60% of the first 200 bytes are printable ASCII or whitespace.
fn is_probably_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(BINARY_SAMPLE)];
    if sample.is_empty() {
        return false;
    }
    let printable = sample
        .iter()
        .filter(|&&b| (0x20..=0x7e).contains(&b) || matches!(b, b'\t' | b'\n' | b'\r'))
        .count();
    (printable as f64 / sample.len() as f64) < MIN_PRINTABLE_FRACTION
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    const PACKET: &str = "1500e4a1b2c3d4e5f60718293a4b5c6d7e8f9012";

    fn run(payload: &[u8]) -> Option<PacketBlob> {
        extract("meshcore/test", payload)
    }

    #[test]
    fn empty_payload() {
        assert!(run(b"").is_none());
    }

    #[rstest]
    #[case(PACKET)]
    #[case("  1500E4A1B2C3D4E5F60718293A4B5C6D7E8F9012\n")]
    fn bare_hex_text(#[case] payload: &str) {
        let blob = run(payload.as_bytes()).unwrap();
        assert_eq!(blob.hex, PACKET);
        assert_eq!(blob.encoding, EncodingHint::Hex);
        assert_eq!(blob.source_path, "text");
    }

    #[rstest]
    // too short
    #[case("1500e4a1b2c3d4e5f6")]
    // odd length
    #[case("1500e4a1b2c3d4e5f60718293a4b5c6d7e8f901")]
    // not hex
    #[case("1500e4a1b2c3d4e5f60718293a4b5c6d7e8f90zz")]
    #[case("hello world, this is just a chat line")]
    fn printable_non_packets(#[case] payload: &str) {
        assert!(run(payload.as_bytes()).is_none());
    }

    #[test]
    fn json_known_key() {
        let payload = format!(r#"{{"packet_hex":"{PACKET}"}}"#);
        let blob = run(payload.as_bytes()).unwrap();
        assert_eq!(blob.hex, PACKET);
        assert_eq!(blob.source_path, "root.packet_hex");
    }

    #[test]
    fn known_keys_are_searched_first() {
        let other = "ffffffffffffffffffffffffffffffffffffffff";
        let payload = format!(r#"{{"note":"{other}","origin":"x","raw":"{PACKET}"}}"#);
        let blob = run(payload.as_bytes()).unwrap();
        assert_eq!(blob.hex, PACKET);
        assert_eq!(blob.source_path, "root.raw");
    }

    #[test]
    fn ties_keep_document_order() {
        let first = "ffffffffffffffffffffffffffffffffffffffff";
        let payload = format!(r#"{{"data":"{first}","hex":"{PACKET}"}}"#);
        assert_eq!(run(payload.as_bytes()).unwrap().hex, first);
    }

    #[test]
    fn non_hex_known_key_falls_through_to_later_key() {
        let payload = format!(r#"{{"payload":"not a packet","other":"{PACKET}"}}"#);
        let blob = run(payload.as_bytes()).unwrap();
        assert_eq!(blob.source_path, "root.other");
    }

    #[test]
    fn nested_objects_and_arrays() {
        let payload = format!(r#"{{"meta":{{"rssi":-90}},"frames":[{{"snr":4}},{{"raw":"{PACKET}"}}]}}"#);
        let blob = run(payload.as_bytes()).unwrap();
        assert_eq!(blob.hex, PACKET);
        assert_eq!(blob.source_path, "root.frames[1].raw");
    }

    #[test]
    fn base64_field() {
        let bytes = hex::decode(PACKET).unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        assert!(encoded.contains('='));
        let payload = format!(r#"{{"data":"{encoded}"}}"#);
        let blob = run(payload.as_bytes()).unwrap();
        assert_eq!(blob.hex, PACKET);
        assert_eq!(blob.encoding, EncodingHint::Base64);
    }

    #[test]
    fn base64_text_needs_a_marker_character() {
        // Decodes fine but has no `+`, `/` or `=`.
        assert!(run(b"QUJDREVGR0hJSktMTU5PUFFSU1RV").is_none());
        let blob = run(b"QUJDREVGR0hJSktMTU5PUFFSU1RVVg==").unwrap();
        assert_eq!(blob.encoding, EncodingHint::Base64);
        assert_eq!(blob.hex, hex::encode(b"ABCDEFGHIJKLMNOPQRSTUV"));
    }

    #[test]
    fn base64_stops_at_first_padding() {
        let blob = run(b"QUJDREVGR0hJSktM=TU5PUFFSU1RVVg").unwrap();
        assert_eq!(blob.encoding, EncodingHint::Base64);
        assert_eq!(blob.hex, hex::encode(b"ABCDEFGHIJKL"));

        // Too little data before the padding to be a packet.
        assert!(run(b"QUJD=REVGR0hJSktMTU5PUFFSU1RVVg").is_none());
    }

    #[test]
    fn int_array_field() {
        let payload = r#"{"bytes":[21,0,228,161,178,195,212,229,246,7,24]}"#;
        let blob = run(payload.as_bytes()).unwrap();
        assert_eq!(blob.hex, "1500e4a1b2c3d4e5f60718");
        assert_eq!(blob.encoding, EncodingHint::IntArray);
        assert_eq!(blob.source_path, "root.bytes");
    }

    #[rstest]
    // too few bytes
    #[case(r#"{"bytes":[1,2,3]}"#)]
    // out of byte range
    #[case(r#"{"bytes":[1,2,3,4,5,6,7,8,9,300]}"#)]
    // not integers
    #[case(r#"{"bytes":[1.5,2,3,4,5,6,7,8,9,10]}"#)]
    fn rejected_int_arrays(#[case] payload: &str) {
        assert!(run(payload.as_bytes()).is_none());
    }

    #[test]
    fn malformed_json_falls_back_to_nothing_printable() {
        assert!(run(br#"{"packet_hex": "#).is_none());
        assert!(run(b"{not json at all}").is_none());
    }

    #[test]
    fn json_without_packet_is_none() {
        assert!(run(br#"{"type":"status","battery":87}"#).is_none());
    }

    #[test]
    fn raw_binary() {
        let bytes = hex::decode(PACKET).unwrap();
        let blob = run(&bytes).unwrap();
        assert_eq!(blob.hex, PACKET);
        assert_eq!(blob.encoding, EncodingHint::Binary);
    }

    #[test]
    fn short_binary_is_ignored() {
        assert!(run(&[0x00, 0x01, 0xff]).is_none());
    }

    #[test]
    fn mostly_printable_bytes_are_not_binary() {
        let mut bytes = b"status ok, nothing to see here".to_vec();
        bytes.extend_from_slice(&[0x00, 0x01, 0x02]);
        assert!(run(&bytes).is_none());
    }

    #[rstest]
    #[case(b"\x00\x01\x02\x03\x04\x05\x06\x07".as_slice(), true)]
    #[case(b"plain\ttext\r\n".as_slice(), false)]
    #[case(b"".as_slice(), false)]
    fn binary_sampling(#[case] bytes: &[u8], #[case] expected: bool) {
        assert_eq!(is_probably_binary(bytes), expected);
    }
}
