//! The Lobby tier: where players gather, form games, and are sent on.
//!
//! A client's first connection is always to the Lobby. There it either
//! takes part in forming a game, which ends with a hand-off to a Game
//! Server, or it is recognised as someone with a seat waiting in a
//! running game and is forwarded straight there.

mod games;
mod handoff;
mod reconnection;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use waypoint_game::GameRegistry;
use waypoint_protocol::{
    ChannelName, ClientMessage, ConnectionId, GameName, GameSnapshot, HandshakeParams,
    ServerMessage,
};
use waypoint_session::{
    ClaimTokenCodec, ClaimTokenSecret, IdentityProvider, Outbox, UserSession,
    UserSessionRegistry,
};
use waypoint_store::{GameSessionStore, PendingReconnectionStore};

use crate::config::{GameServerAddress, LobbyConfig};
use crate::gateway::{ClientEndpoint, OutgoingMessageGateway};
use crate::server::{Tier, WaypointServer};
use crate::WaypointError;

use reconnection::LobbyConnectionContext;

/// Everything the Lobby mutates while handling one event.
///
/// Guarded by a single lock held for the whole of each handler.
pub(crate) struct LobbyState {
    pub(crate) sessions: UserSessionRegistry,
    pub(crate) games: GameRegistry,
    pub(crate) gateway: OutgoingMessageGateway,
    /// Connections only passing through on their way to a Game Server.
    pub(crate) forwarded: HashSet<ConnectionId>,
    /// Round-robin cursor into `LobbyConfig::game_servers`.
    pub(crate) next_game_server: usize,
}

pub(crate) struct LobbyInner<I, R, G> {
    pub(crate) config: LobbyConfig,
    pub(crate) identity: I,
    pub(crate) reconnections: R,
    pub(crate) game_sessions: G,
    pub(crate) claim_codec: ClaimTokenCodec,
    pub(crate) state: Mutex<LobbyState>,
}

/// The Lobby tier.
///
/// Cheap to clone; all clones share one state.
pub struct Lobby<I, R, G> {
    pub(crate) inner: Arc<LobbyInner<I, R, G>>,
}

impl<I, R, G> Clone for Lobby<I, R, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for a [`Lobby`].
///
/// # Example
///
/// ```rust,ignore
/// let lobby = Lobby::builder(identity, reconnections, game_sessions, secret)
///     .bind("0.0.0.0:8082")
///     .game_server(GameServerAddress::new("gs-1", "ws://games-1:8083"))
///     .build();
/// lobby.serve().await
/// ```
pub struct LobbyBuilder<I, R, G> {
    config: LobbyConfig,
    identity: I,
    reconnections: R,
    game_sessions: G,
    secret: ClaimTokenSecret,
}

impl<I, R, G> LobbyBuilder<I, R, G>
where
    I: IdentityProvider,
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    /// Replaces the whole configuration.
    pub fn config(mut self, config: LobbyConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Adds a Game Server that games can be handed off to.
    pub fn game_server(mut self, server: GameServerAddress) -> Self {
        self.config.game_servers.push(server);
        self
    }

    pub fn build(self) -> Lobby<I, R, G> {
        Lobby {
            inner: Arc::new(LobbyInner {
                claim_codec: ClaimTokenCodec::new(&self.secret),
                config: self.config,
                identity: self.identity,
                reconnections: self.reconnections,
                game_sessions: self.game_sessions,
                state: Mutex::new(LobbyState {
                    sessions: UserSessionRegistry::new(),
                    games: GameRegistry::new(),
                    gateway: OutgoingMessageGateway::new(),
                    forwarded: HashSet::new(),
                    next_game_server: 0,
                }),
            }),
        }
    }
}

impl<I, R, G> Lobby<I, R, G>
where
    I: IdentityProvider,
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    /// Creates a new builder with default settings.
    pub fn builder(
        identity: I,
        reconnections: R,
        game_sessions: G,
        secret: ClaimTokenSecret,
    ) -> LobbyBuilder<I, R, G> {
        LobbyBuilder {
            config: LobbyConfig::default(),
            identity,
            reconnections,
            game_sessions,
            secret,
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.inner.config
    }

    /// `true` when no game is being formed.
    pub async fn no_current_games(&self) -> bool {
        self.inner.state.lock().await.games.is_empty()
    }

    /// Client-facing view of a Lobby game, if it exists.
    pub async fn game(&self, name: &GameName) -> Option<GameSnapshot> {
        self.inner.state.lock().await.games.get(name).map(|g| g.snapshot())
    }

    /// Binds the configured address and serves until terminated.
    pub async fn serve(self) -> Result<(), WaypointError> {
        let addr = self.inner.config.bind_addr.clone();
        WaypointServer::bind(&addr, self).await?.run().await
    }

    /// Registers a session that will take part in the Lobby.
    fn activate(session: &mut UserSession, outbox: &mut Outbox) -> Result<(), WaypointError> {
        session.subscribe(ChannelName::lobby())?;
        outbox.push_to_connection(
            session.connection_id(),
            ServerMessage::ClientUsername {
                username: session.username().clone(),
            },
        );
        Ok(())
    }
}

impl<I, R, G> Tier for Lobby<I, R, G>
where
    I: IdentityProvider,
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    async fn connect(
        &self,
        params: HandshakeParams,
        endpoint: ClientEndpoint,
    ) -> Result<ConnectionId, WaypointError> {
        let identity = self.inner.identity.resolve(&params).await?;

        let mut state = self.inner.state.lock().await;
        let connection_id = state.sessions.issue_connection_id();
        let mut session =
            UserSession::new(connection_id, identity.username, identity.tagged_user_id);
        if let Some(token) = params.guest_reconnection_token {
            if session.is_guest() {
                session.set_guest_reconnection_token(token)?;
            }
        }

        let mut outbox = Outbox::new();
        let forwarded = match self.evaluate_connection_context(&session).await? {
            LobbyConnectionContext::Reconnection(pending) => {
                let instructions = self.reconnection_instructions(&pending)?;
                outbox.push_to_connection(
                    connection_id,
                    ServerMessage::ClientUsername {
                        username: session.username().clone(),
                    },
                );
                outbox.push_to_connection(
                    connection_id,
                    ServerMessage::GameServerConnectionInstructions {
                        connection_instructions: instructions,
                    },
                );
                tracing::info!(
                    %connection_id,
                    game = %pending.game_name,
                    server = %pending.game_server_name,
                    "forwarding reconnecting player to game server"
                );
                true
            }
            LobbyConnectionContext::InitialConnection => {
                Self::activate(&mut session, &mut outbox)?;
                false
            }
        };

        let username = session.username().clone();
        state.sessions.register(session)?;
        if let Err(e) = state.gateway.register_endpoint(connection_id, endpoint) {
            state.sessions.unregister(connection_id)?;
            return Err(e.into());
        }
        if forwarded {
            state.forwarded.insert(connection_id);
        }
        state.gateway.flush(outbox)?;

        tracing::info!(%connection_id, %username, forwarded, "lobby session activated");
        Ok(connection_id)
    }

    async fn handle_message(
        &self,
        connection_id: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), WaypointError> {
        let mut state = self.inner.state.lock().await;
        if state.forwarded.contains(&connection_id) {
            return Err(WaypointError::HandlerNotConfigured(message.kind()));
        }

        let outbox = match message {
            ClientMessage::CreateGame { game_name } => {
                self.create_game(&mut state, connection_id, game_name).await?
            }
            ClientMessage::JoinGame { game_name } => {
                games::join_game(&mut state, connection_id, &game_name)?
            }
            ClientMessage::LeaveGame => games::leave_game(&mut state, connection_id)?,
            ClientMessage::ToggleReadyToStartGame => {
                self.toggle_ready(&mut state, connection_id).await?
            }
            other @ ClientMessage::AttemptGameplayAction { .. } => {
                return Err(WaypointError::HandlerNotConfigured(other.kind()));
            }
        };

        state.gateway.flush(outbox)?;
        Ok(())
    }

    async fn send_error(&self, connection_id: ConnectionId, error: &WaypointError) {
        let state = self.inner.state.lock().await;
        let message = ServerMessage::error(error.client_message());
        if let Err(e) = state.gateway.submit_to_connection(connection_id, message) {
            tracing::error!(%connection_id, error = %e, "could not report error to client");
        }
    }

    async fn disconnect(&self, connection_id: ConnectionId) {
        let mut state = self.inner.state.lock().await;
        let mut outbox = Outbox::new();

        let in_game = state
            .sessions
            .get(connection_id)
            .is_some_and(|s| s.current_game_name().is_some());
        if in_game {
            match games::leave_game(&mut state, connection_id) {
                Ok(left) => outbox.merge(left),
                Err(error) => {
                    tracing::warn!(%connection_id, %error, "leave on disconnect failed");
                }
            }
        }

        state.forwarded.remove(&connection_id);
        if let Err(error) = state.sessions.unregister(connection_id) {
            tracing::debug!(%connection_id, %error, "no session to unregister");
        }
        state.gateway.unregister_endpoint(connection_id);

        outbox.remove_recipients(&[connection_id]);
        // Failures are logged by the gateway.
        let _ = state.gateway.flush(outbox);
        tracing::info!(%connection_id, "lobby session closed");
    }
}
