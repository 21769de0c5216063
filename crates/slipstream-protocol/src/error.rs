//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (the frame is not valid JSON).
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame is a JSON object with no string `type` field.
    ///
    /// Kept separate from [`ProtocolError::InvalidMessage`] because the
    /// hub's contract hinges on it: an ABSENT tag forces closure, while
    /// an unknown tag merely gets ignored.
    #[error("message has no type field")]
    MissingType,

    /// The frame passed JSON parsing but violates the protocol shape.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
