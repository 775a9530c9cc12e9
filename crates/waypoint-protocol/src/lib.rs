//! Wire protocol for Waypoint.
//!
//! This crate defines the vocabulary both tiers and their clients share:
//!
//! - **Identity** ([`TaggedUserId`], [`ReconnectionKey`], [`Username`],
//!   [`GameName`], ...): who and what every message is about.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): the `{type, data}`
//!   frames that travel over the socket.
//! - **Handshake** ([`HandshakeParams`]): what a client presents on the
//!   upgrade request.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become bytes.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes, ConnectionId) → Protocol (typed messages) → Session
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod handshake;
mod identity;
mod messages;
mod time;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use handshake::{
    AUTH_COOKIE_NAME, GUEST_RECONNECTION_TOKEN_PARAM, HandshakeParams,
    SESSION_CLAIM_TOKEN_PARAM,
};
pub use identity::{
    ChannelName, GameId, GameName, GameServerName, GuestReconnectionToken,
    GuestUserId, IdentityProviderId, ReconnectionKey, TaggedUserId, Username,
};
pub use messages::{
    ClientMessage, ConnectionInstructions, GameSnapshot, PlayerSnapshot,
    ServerMessage,
};
pub use time::{UnixMillis, unix_millis};
pub use waypoint_transport::ConnectionId;
