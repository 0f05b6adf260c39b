//! Hex string helpers shared by the config loader and the packet decoder.

/// Returns true when every character is an ASCII hex digit.
pub fn is_hex_digits(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Normalize a secret or channel hash.
///
/// Trims and lowercases the input; anything that is empty, of odd length or
/// contains non-hex characters normalizes to an empty string.
pub fn normalize_hex(value: &str) -> String {
    let trimmed = value.trim().to_ascii_lowercase();
    if trimmed.is_empty() || trimmed.len() % 2 != 0 || !is_hex_digits(&trimmed) {
        return String::new();
    }
    trimmed
}
