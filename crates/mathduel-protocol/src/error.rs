//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing required field,
    /// or an unknown action type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but violates a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Whether a decode failure was caused by an absent required field.
    ///
    /// Used to map such failures onto the `MissingField` error the client
    /// contract distinguishes from generally malformed input.
    pub fn is_missing_field(&self) -> bool {
        match self {
            #[cfg(feature = "json")]
            Self::Decode(e) => e.to_string().starts_with("missing field"),
            _ => false,
        }
    }
}
