//! Error types for the protocol layer.
//!
//! Each crate in Waypoint defines its own error enum. A `ProtocolError`
//! always means the bytes on the wire were the problem, never the state
//! of a game or session.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown message `type`, missing
    /// fields, or wrong data types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is invalid at the protocol level even though it
    /// deserialized.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
