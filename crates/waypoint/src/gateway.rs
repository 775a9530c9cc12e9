//! Outgoing message gateway: the boundary where outboxes meet sockets.

use std::collections::HashMap;

use tokio::sync::mpsc;
use waypoint_protocol::{ConnectionId, ServerMessage};
use waypoint_session::{MessageDispatch, Outbox};
use waypoint_transport::TransportError;

/// Where a connection's outgoing messages go.
///
/// The WebSocket handler drains the receiving half into the socket;
/// in-process tests read it directly.
pub type ClientEndpoint = mpsc::UnboundedSender<ServerMessage>;

/// Maps connection ids to their outgoing endpoints and delivers outboxes.
///
/// Handlers never touch sockets. They build an [`Outbox`] and hand it to
/// [`flush`](Self::flush), which is the only place messages leave a tier.
#[derive(Debug, Default)]
pub struct OutgoingMessageGateway {
    endpoints: HashMap<ConnectionId, ClientEndpoint>,
}

impl OutgoingMessageGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// [`TransportError::EndpointAlreadyRegistered`] if `connection_id`
    /// already has an endpoint.
    pub fn register_endpoint(
        &mut self,
        connection_id: ConnectionId,
        endpoint: ClientEndpoint,
    ) -> Result<(), TransportError> {
        if self.endpoints.contains_key(&connection_id) {
            return Err(TransportError::EndpointAlreadyRegistered(connection_id));
        }
        self.endpoints.insert(connection_id, endpoint);
        Ok(())
    }

    /// Removes an endpoint. Returns `false` if none was registered.
    pub fn unregister_endpoint(&mut self, connection_id: ConnectionId) -> bool {
        self.endpoints.remove(&connection_id).is_some()
    }

    pub fn is_registered(&self, connection_id: ConnectionId) -> bool {
        self.endpoints.contains_key(&connection_id)
    }

    /// Queues one message for one connection.
    ///
    /// A registered endpoint whose socket already closed is not an error:
    /// the connection's cleanup is on its way and will unregister it.
    ///
    /// # Errors
    /// [`TransportError::EndpointNotRegistered`] if the connection has no
    /// endpoint, which means the session registry and this gateway
    /// disagree.
    pub fn submit_to_connection(
        &self,
        connection_id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), TransportError> {
        let endpoint = self
            .endpoints
            .get(&connection_id)
            .ok_or(TransportError::EndpointNotRegistered(connection_id))?;
        if endpoint.send(message).is_err() {
            tracing::debug!(%connection_id, "endpoint closed, message dropped");
        }
        Ok(())
    }

    /// Delivers every dispatch of `outbox`, in order.
    ///
    /// Delivery continues past a failing recipient so that one skewed
    /// connection does not starve the rest of the audience.
    ///
    /// # Errors
    /// The first [`TransportError::EndpointNotRegistered`] encountered.
    /// Every failure is logged at `error` level.
    pub fn flush(&self, outbox: Outbox) -> Result<(), TransportError> {
        let mut first_error = None;
        for dispatch in outbox.into_dispatches() {
            let result = match dispatch {
                MessageDispatch::Single {
                    connection_id,
                    message,
                } => self.submit_to_connection(connection_id, message),
                MessageDispatch::FanOut {
                    connection_ids,
                    message,
                } => connection_ids.iter().try_for_each(|id| {
                    self.submit_to_connection(*id, message.clone())
                }),
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "outbox dispatch failed, registry and gateway are out of sync");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
