//! Error types for the store layer.

use waypoint_protocol::TaggedUserId;

/// Errors that a store implementation can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing service could not be reached or refused the call.
    ///
    /// The in-memory stores never return this; networked implementations
    /// map their client errors here.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A guest pending reconnection record had no token to key it by.
    #[error("no reconnection key for {0}")]
    MissingReconnectionKey(TaggedUserId),
}
