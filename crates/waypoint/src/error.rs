//! Unified error type for the Waypoint framework.

use waypoint_game::GameError;
use waypoint_protocol::{GameName, GameServerName, ProtocolError};
use waypoint_session::SessionError;
use waypoint_store::StoreError;
use waypoint_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Tier handlers return this single type. The `#[from]` attribute on each
/// wrapped variant lets `?` convert sub-crate errors automatically.
///
/// Whether an error is fatal depends on *where* it surfaces, not on its
/// variant: during admission every error closes the socket, while during
/// message handling every error becomes an `ErrorMessage` to the sender
/// and the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum WaypointError {
    /// A transport-level error (send, endpoint registry skew).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (malformed frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (admission, registry contract, game membership).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A game-level error (not found, locked, already started).
    #[error(transparent)]
    Game(#[from] GameError),

    /// A cross-tier store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The tier does not handle this client message type.
    #[error("no handler configured for message type {0}")]
    HandlerNotConfigured(&'static str),

    /// No open reconnection opportunity could be claimed.
    #[error("reconnection claim rejected")]
    InvalidReconnectionClaim,

    /// A Game Server connection arrived without a claim token.
    #[error("missing session claim token")]
    MissingClaimToken,

    /// The claim token names a game this server neither hosts nor has a
    /// pending setup for.
    #[error("no game setup found for {0}")]
    GameSetupNotFound(GameName),

    /// A pending reconnection points at a Game Server the Lobby does not know.
    #[error("unknown game server {0}")]
    UnknownGameServer(GameServerName),

    /// Hand-off was attempted with no Game Servers configured.
    #[error("no game servers configured")]
    NoGameServers,

    /// The handler panicked; the panic was contained to this one message.
    #[error("handler panicked")]
    HandlerPanicked,
}

impl WaypointError {
    /// Text to put in the `ErrorMessage` sent to the client.
    ///
    /// Errors a user can cause and fix get their own wording. Everything
    /// else is an internal fault and is not described to the client.
    pub fn client_message(&self) -> String {
        match self {
            Self::Game(e) => e.to_string(),
            Self::Session(e @ (SessionError::AlreadyInGame | SessionError::NotInGame)) => {
                e.to_string()
            }
            Self::Protocol(_) => "Invalid message".to_string(),
            Self::HandlerNotConfigured(kind) => format!("Unsupported message type: {kind}"),
            _ => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use waypoint_protocol::ConnectionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: WaypointError = TransportError::EndpointNotRegistered(ConnectionId::new(3)).into();
        assert!(matches!(err, WaypointError::Transport(_)));
        assert!(err.to_string().contains("conn-3"));
    }

    #[test]
    fn test_from_game_error() {
        let err: WaypointError = GameError::InputLocked(GameName::new("g")).into();
        assert!(matches!(err, WaypointError::Game(_)));
    }

    #[test]
    fn test_client_message_game_errors_pass_through() {
        let err: WaypointError = GameError::NotFound(GameName::new("g")).into();
        assert_eq!(err.client_message(), "Game not found");

        let err: WaypointError = GameError::InputLocked(GameName::new("g")).into();
        assert_eq!(
            err.client_message(),
            "That game is not currently accepting player inputs"
        );
    }

    #[test]
    fn test_client_message_membership_errors_pass_through() {
        let err: WaypointError = SessionError::AlreadyInGame.into();
        assert_eq!(err.client_message(), "Already in a game");
    }

    #[test]
    fn test_client_message_internal_errors_are_opaque() {
        let err: WaypointError = StoreError::Unavailable("redis down".into()).into();
        assert_eq!(err.client_message(), "Internal server error");

        let err: WaypointError = SessionError::SessionNotFound(ConnectionId::new(1)).into();
        assert!(!err.client_message().contains("conn-1"));
    }
}
