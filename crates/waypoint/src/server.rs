//! The `Tier` seam and the WebSocket server loop.
//!
//! Both the Lobby and the Game Server are a [`Tier`]: something that can
//! admit a connection, handle its messages, and clean up after it. One
//! [`WaypointServer`] accept loop serves either of them.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use waypoint_protocol::{ClientMessage, Codec, ConnectionId, HandshakeParams, JsonCodec};
use waypoint_transport::{Transport, WebSocketTransport};

use crate::WaypointError;
use crate::gateway::ClientEndpoint;
use crate::handler::handle_connection;

/// A server tier driven by per-connection events.
///
/// Implementations keep all their state behind a shared handle, so
/// `Clone` is cheap and every clone talks to the same tier.
pub trait Tier: Clone + Send + Sync + 'static {
    /// Admits a new connection whose outgoing messages go to `endpoint`.
    ///
    /// # Errors
    /// Any error rejects the connection; the caller closes the socket
    /// with a policy-violation code.
    fn connect(
        &self,
        params: HandshakeParams,
        endpoint: ClientEndpoint,
    ) -> impl Future<Output = Result<ConnectionId, WaypointError>> + Send;

    /// Handles one decoded client intent.
    fn handle_message(
        &self,
        connection_id: ConnectionId,
        message: ClientMessage,
    ) -> impl Future<Output = Result<(), WaypointError>> + Send;

    /// Tells `connection_id` that its last message failed.
    fn send_error(
        &self,
        connection_id: ConnectionId,
        error: &WaypointError,
    ) -> impl Future<Output = ()> + Send;

    /// Cleans up after a closed connection.
    fn disconnect(&self, connection_id: ConnectionId) -> impl Future<Output = ()> + Send;

    /// Decodes and handles one raw frame.
    ///
    /// This is the per-message error boundary. A decode failure, a
    /// handler error, or a handler panic becomes an `ErrorMessage` to the
    /// sender. Nothing here closes the connection or reaches any other
    /// connection.
    fn handle_frame(
        &self,
        connection_id: ConnectionId,
        frame: &[u8],
    ) -> impl Future<Output = ()> + Send {
        let decoded = JsonCodec.decode::<ClientMessage>(frame);
        async move {
            let result = match decoded {
                Ok(message) => {
                    tracing::debug!(%connection_id, kind = message.kind(), "message received");
                    AssertUnwindSafe(self.handle_message(connection_id, message))
                        .catch_unwind()
                        .await
                        .unwrap_or(Err(WaypointError::HandlerPanicked))
                }
                Err(e) => Err(e.into()),
            };

            if let Err(error) = result {
                tracing::warn!(%connection_id, %error, "message handling failed");
                self.send_error(connection_id, &error).await;
            }
        }
    }
}

/// WebSocket accept loop for one [`Tier`].
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct WaypointServer<T: Tier> {
    transport: WebSocketTransport,
    tier: T,
}

impl<T: Tier> WaypointServer<T> {
    /// Binds a listener for `tier` on `addr`.
    pub async fn bind(addr: &str, tier: T) -> Result<Self, WaypointError> {
        let transport = WebSocketTransport::bind(addr).await?;
        Ok(Self { transport, tier })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each accepted socket gets its own task; a failed upgrade is logged
    /// and the loop keeps going.
    pub async fn run(mut self) -> Result<(), WaypointError> {
        tracing::info!(addr = ?self.local_addr().ok(), "waypoint server running");

        loop {
            match self.transport.accept().await {
                Ok((conn, request)) => {
                    let tier = self.tier.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, request, tier).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
