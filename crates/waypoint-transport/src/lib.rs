//! Transport abstraction layer for Waypoint.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the socket technology both tiers accept clients on, plus the
//! [`ConnectionId`] every higher layer uses to address a socket.
//!
//! The transport knows nothing about sessions or messages. It hands the
//! server an accepted connection together with the raw pieces of the
//! upgrade request ([`HandshakeRequest`]) that admission depends on.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// RFC 6455 §7.4.1 close code for "policy violation".
///
/// Sent when a connection attempt is refused after the upgrade, e.g. an
/// invalid, expired or replayed session claim token.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Opaque identifier for a connection.
///
/// Ids are handed out by the session registry at connect time and are
/// never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The parts of a client's upgrade request that the server cares about.
///
/// Captured during the handshake because they are gone once the socket
/// has been upgraded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Raw query string of the request URI, without the leading `?`.
    pub query: Option<String>,
    /// Raw value of the `Cookie` header.
    pub cookie: Option<String>,
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(
        &mut self,
    ) -> Result<(Self::Connection, HandshakeRequest), Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single connection that carries text frames in both directions.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends a text frame to the remote peer.
    async fn send(&self, text: &str) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection with the given close code and reason.
    async fn close(&self, code: u16, reason: &str) -> Result<(), Self::Error>;
}
