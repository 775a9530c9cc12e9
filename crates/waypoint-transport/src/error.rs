use crate::ConnectionId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A message was addressed to a connection with no registered endpoint.
    ///
    /// This means the session registry and the outgoing gateway disagree
    /// about which connections exist. It is a wiring bug, not a client
    /// error, and callers should surface it loudly.
    #[error("no endpoint registered for {0}")]
    EndpointNotRegistered(ConnectionId),

    /// An endpoint was registered twice for the same connection.
    #[error("endpoint already registered for {0}")]
    EndpointAlreadyRegistered(ConnectionId),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
