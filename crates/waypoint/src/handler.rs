//! Per-connection handler: admission, writer task, and read loop.
//!
//! Each accepted socket gets its own Tokio task running this handler.
//! The flow is:
//!   1. Parse handshake parameters from the upgrade request
//!   2. Ask the tier to admit the connection; close with 1008 on refusal
//!   3. Spawn a writer task draining the connection's endpoint
//!   4. Loop: receive frames, hand each to the tier in arrival order

use std::sync::Arc;

use tokio::sync::mpsc;
use waypoint_protocol::{Codec, ConnectionId, HandshakeParams, JsonCodec, ServerMessage};
use waypoint_transport::{CLOSE_POLICY_VIOLATION, Connection, HandshakeRequest, WebSocketConnection};

use crate::{Tier, WaypointError};

/// Drop guard that disconnects a session when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async tier.
struct ConnectionGuard<T: Tier> {
    connection_id: ConnectionId,
    tier: T,
}

impl<T: Tier> Drop for ConnectionGuard<T> {
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        let tier = self.tier.clone();
        tokio::spawn(async move {
            tier.disconnect(connection_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<T: Tier>(
    conn: WebSocketConnection,
    request: HandshakeRequest,
    tier: T,
) -> Result<(), WaypointError> {
    let peer = conn.peer_addr();
    let params = HandshakeParams::from_request(&request);
    let (endpoint, mut outgoing) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = match tier.connect(params, endpoint).await {
        Ok(id) => id,
        Err(error) => {
            tracing::warn!(%peer, %error, "connection rejected");
            conn.close(CLOSE_POLICY_VIOLATION, &error.to_string()).await?;
            return Ok(());
        }
    };
    tracing::debug!(%peer, %connection_id, "connection admitted");

    let _guard = ConnectionGuard {
        connection_id,
        tier: tier.clone(),
    };

    let conn = Arc::new(conn);
    let writer = tokio::spawn({
        let conn = Arc::clone(&conn);
        async move {
            while let Some(message) = outgoing.recv().await {
                let text = match JsonCodec.encode_text(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(%connection_id, error = %e, "failed to encode server message");
                        continue;
                    }
                };
                if let Err(e) = conn.send(&text).await {
                    tracing::debug!(%connection_id, error = %e, "send failed, writer stopping");
                    break;
                }
            }
        }
    });

    loop {
        match conn.recv().await {
            Ok(Some(frame)) => tier.handle_frame(connection_id, &frame).await,
            Ok(None) => {
                tracing::info!(%connection_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "recv error");
                break;
            }
        }
    }

    writer.abort();
    // _guard drops here → tier disconnect fires.
    Ok(())
}
