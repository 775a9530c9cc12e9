//! Error types for the session layer.

use waypoint_protocol::{ChannelName, ConnectionId, TaggedUserId};

/// Errors that can occur while creating, tracking, or admitting sessions.
///
/// Two families live here. Registry contract violations
/// (`DuplicateSession`, `AlreadySubscribed`, ...) mean calling code broke
/// an invariant. Admission failures (`ClaimTokenDecode`, `ExpiredToken`,
/// `ReplayedNonce`, `DuplicateConnection`) are fatal to one connection
/// attempt and cause the socket to be closed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The identity provider rejected the presented credential.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A session is already registered for this connection.
    #[error("a session is already registered for {0}")]
    DuplicateSession(ConnectionId),

    /// No session is registered for this connection.
    #[error("no session registered for {0}")]
    SessionNotFound(ConnectionId),

    /// The session is already subscribed to the channel.
    #[error("{connection_id} is already subscribed to {channel}")]
    AlreadySubscribed {
        connection_id: ConnectionId,
        channel: ChannelName,
    },

    /// The session is not subscribed to the channel.
    #[error("{connection_id} is not subscribed to {channel}")]
    NotSubscribed {
        connection_id: ConnectionId,
        channel: ChannelName,
    },

    /// The user tried to join a game while already in one.
    #[error("Already in a game")]
    AlreadyInGame,

    /// The operation requires being in a game.
    #[error("Not in a game")]
    NotInGame,

    /// Guest-only operation attempted on an authenticated session.
    #[error("{0} is not a guest session")]
    NotAGuest(ConnectionId),

    /// The claim token could not be serialized or encrypted.
    #[error("failed to encode session claim token: {0}")]
    ClaimTokenEncode(String),

    /// The claim token was malformed, truncated, or forged.
    #[error("failed to decode session claim token: {0}")]
    ClaimTokenDecode(String),

    /// The claim token's expiration timestamp has passed.
    #[error("session claim token expired")]
    ExpiredToken,

    /// The claim token's nonce has already been consumed.
    #[error("session claim token replay suspected")]
    ReplayedNonce,

    /// The user already holds a live connection on this server.
    #[error("{0} already has an active connection")]
    DuplicateConnection(TaggedUserId),

    /// The shared claim token secret is unusable.
    #[error("invalid claim token secret: {0}")]
    InvalidSecret(String),
}
