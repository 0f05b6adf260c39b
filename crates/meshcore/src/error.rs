/// Crate-wide result type for packet decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Why a packet blob could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The blob is not valid hex.
    #[error("invalid packet hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The packet ended before a required field.
    #[error("packet truncated: {field} needs {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// The payload is present but structurally invalid for its type.
    #[error("malformed {kind} payload: {message}")]
    MalformedPayload { kind: &'static str, message: String },
}

impl DecodeError {
    #[must_use]
    pub fn truncated(field: &'static str, needed: usize, available: usize) -> Self {
        Self::Truncated {
            field,
            needed,
            available,
        }
    }

    #[must_use]
    pub fn malformed(kind: &'static str, message: impl std::fmt::Display) -> Self {
        Self::MalformedPayload {
            kind,
            message: message.to_string(),
        }
    }
}
