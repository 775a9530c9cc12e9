//! The Game Server tier: hosts handed-off games until they end.
//!
//! Nobody connects here without a session claim token minted by the
//! Lobby. Admission validates that token, materializes the game from its
//! pending setup on first arrival, and seats the player. From then on
//! this server owns the game: it starts it once everyone has arrived,
//! accepts gameplay actions, holds seats open for players who drop, and
//! keeps the game's `ActiveGameStatus` fresh so the Lobby knows it lives.

mod games;
mod reconnection;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use waypoint_game::GameRegistry;
use waypoint_heartbeat::{HeartbeatConfig, HeartbeatHandle, HeartbeatScheduler};
use waypoint_protocol::{
    ClientMessage, ConnectionId, GameName, GameServerName, GameSnapshot, HandshakeParams,
    ServerMessage, unix_millis,
};
use waypoint_session::{
    ClaimTokenCodec, ClaimTokenSecret, NonceLedger, Outbox, SessionError, UserSession,
    UserSessionRegistry,
};
use waypoint_store::{ActiveGameStatus, GameSessionStore, PendingReconnectionStore};

use crate::WaypointError;
use crate::config::GameServerConfig;
use crate::gateway::{ClientEndpoint, OutgoingMessageGateway};
use crate::opportunity::ReconnectionOpportunityManager;
use crate::server::{Tier, WaypointServer};

use reconnection::GameServerConnectionContext;

/// Everything the Game Server mutates while handling one event.
pub(crate) struct GameServerState {
    pub(crate) sessions: UserSessionRegistry,
    pub(crate) games: GameRegistry,
    pub(crate) gateway: OutgoingMessageGateway,
    /// Claim token nonces already spent on this process.
    pub(crate) nonces: NonceLedger,
    pub(crate) opportunities: ReconnectionOpportunityManager,
}

pub(crate) struct GameServerInner<R, G> {
    pub(crate) config: GameServerConfig,
    pub(crate) reconnections: R,
    pub(crate) game_sessions: G,
    pub(crate) claim_codec: ClaimTokenCodec,
    pub(crate) state: Mutex<GameServerState>,
}

/// The Game Server tier.
///
/// Cheap to clone; all clones share one state.
pub struct GameServer<R, G> {
    pub(crate) inner: Arc<GameServerInner<R, G>>,
}

impl<R, G> Clone for GameServer<R, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for a [`GameServer`].
pub struct GameServerBuilder<R, G> {
    config: GameServerConfig,
    reconnections: R,
    game_sessions: G,
    secret: ClaimTokenSecret,
}

impl<R, G> GameServerBuilder<R, G>
where
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    pub fn config(mut self, config: GameServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// The name the Lobby knows this server by.
    pub fn name(mut self, name: impl Into<GameServerName>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn reconnection_timeout(mut self, timeout: Duration) -> Self {
        self.config.reconnection_timeout = timeout;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    pub fn build(self) -> GameServer<R, G> {
        GameServer {
            inner: Arc::new(GameServerInner {
                claim_codec: ClaimTokenCodec::new(&self.secret),
                config: self.config,
                reconnections: self.reconnections,
                game_sessions: self.game_sessions,
                state: Mutex::new(GameServerState {
                    sessions: UserSessionRegistry::new(),
                    games: GameRegistry::new(),
                    gateway: OutgoingMessageGateway::new(),
                    nonces: NonceLedger::new(),
                    opportunities: ReconnectionOpportunityManager::new(),
                }),
            }),
        }
    }
}

impl<R, G> GameServer<R, G>
where
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    /// Creates a new builder with default settings.
    ///
    /// `secret` must be the one the Lobby encrypts claim tokens with.
    pub fn builder(
        reconnections: R,
        game_sessions: G,
        secret: ClaimTokenSecret,
    ) -> GameServerBuilder<R, G> {
        GameServerBuilder {
            config: GameServerConfig::default(),
            reconnections,
            game_sessions,
            secret,
        }
    }

    pub fn config(&self) -> &GameServerConfig {
        &self.inner.config
    }

    /// Client-facing view of a hosted game, if this server hosts it.
    pub async fn game(&self, name: &GameName) -> Option<GameSnapshot> {
        self.inner.state.lock().await.games.get(name).map(|g| g.snapshot())
    }

    /// Number of games this server currently hosts.
    pub async fn hosted_games(&self) -> usize {
        self.inner.state.lock().await.games.len()
    }

    /// Number of reconnection windows currently open.
    pub async fn open_reconnection_opportunities(&self) -> usize {
        self.inner.state.lock().await.opportunities.len()
    }

    /// Rewrites the `ActiveGameStatus` of every hosted game with the
    /// current time.
    ///
    /// The state lock is held until the last write, so a game torn down
    /// concurrently never gets its status written back. Store failures are
    /// logged and do not stop the other games from being refreshed.
    pub async fn refresh_active_games(&self) {
        let state = self.inner.state.lock().await;
        let hosted: Vec<_> = state
            .games
            .iter()
            .map(|game| (game.name().clone(), game.id().clone()))
            .collect();

        let now = unix_millis();
        for (game_name, game_id) in hosted {
            let status = ActiveGameStatus {
                game_name: game_name.clone(),
                game_id,
                game_server_name: self.inner.config.name.clone(),
                last_heartbeat: now,
            };
            if let Err(error) = self.inner.game_sessions.write_active_status(status).await {
                tracing::warn!(game = %game_name, %error, "failed to refresh active game status");
            }
        }
        drop(state);
    }

    /// Starts the heartbeat that keeps hosted games visible to the Lobby.
    ///
    /// The heartbeat stops when the returned handle is dropped.
    pub fn start_heartbeat(&self) -> HeartbeatHandle {
        let config = HeartbeatConfig {
            tick: self.inner.config.heartbeat_interval,
            ..HeartbeatConfig::default()
        };
        let server = self.clone();
        HeartbeatScheduler::new(config)
            .with_task("active-game-status", move || {
                let server = server.clone();
                async move { server.refresh_active_games().await }
            })
            .start()
    }

    /// Starts the heartbeat, binds the configured address, and serves
    /// until terminated.
    pub async fn serve(self) -> Result<(), WaypointError> {
        let _heartbeat = self.start_heartbeat();
        let addr = self.inner.config.bind_addr.clone();
        WaypointServer::bind(&addr, self).await?.run().await
    }

    /// Validates the claim token and builds the session it entitles.
    ///
    /// Decode, expiry, replay, then duplicate connection, in that order.
    /// The session is not registered yet.
    fn admit(
        &self,
        state: &mut GameServerState,
        params: &HandshakeParams,
    ) -> Result<UserSession, WaypointError> {
        let encoded = params
            .session_claim_token
            .as_deref()
            .ok_or(WaypointError::MissingClaimToken)?;
        let token = self.inner.claim_codec.decode(encoded)?;

        let now = unix_millis();
        if token.is_expired_at(now) {
            return Err(SessionError::ExpiredToken.into());
        }
        state
            .nonces
            .consume(token.nonce(), token.expiration_timestamp(), now)?;

        let user = token.tagged_user_id();
        if state.sessions.user_is_already_connected(user) {
            let existing = state.sessions.connection_ids_for_user(user);
            tracing::warn!(?user, ?existing, "claim presented by a user already seated here");
            return Err(SessionError::DuplicateConnection(user.clone()).into());
        }

        let connection_id = state.sessions.issue_connection_id();
        let mut session = UserSession::new(
            connection_id,
            token.username().clone(),
            token.tagged_user_id().clone(),
        );
        if let Some(guest_token) = token.guest_reconnection_token() {
            session.set_guest_reconnection_token(guest_token.clone())?;
        }
        session.set_current_game(token.game_name().clone());
        Ok(session)
    }
}

impl<R, G> Tier for GameServer<R, G>
where
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    async fn connect(
        &self,
        params: HandshakeParams,
        endpoint: ClientEndpoint,
    ) -> Result<ConnectionId, WaypointError> {
        // Held from nonce consumption to registration, so no two
        // admissions interleave.
        let mut state = self.inner.state.lock().await;
        let mut session = self.admit(&mut state, &params)?;
        let connection_id = session.connection_id();
        let game_name = session.require_current_game()?.clone();

        self.get_or_initialize_game(&mut state, &game_name).await?;
        match self.evaluate_connection_context(&state, &game_name)? {
            GameServerConnectionContext::Reconnection => {
                self.attempt_reconnection_claim(&mut state, &mut session).await?;
            }
            GameServerConnectionContext::InitialConnection => {
                self.release_open_opportunity(&mut state, &mut session).await?;
            }
        }

        let username = session.username().clone();
        state.sessions.register(session)?;
        if let Err(e) = state.gateway.register_endpoint(connection_id, endpoint) {
            state.sessions.unregister(connection_id)?;
            return Err(e.into());
        }

        let mut outbox = Outbox::new();
        outbox.push_to_connection(
            connection_id,
            ServerMessage::ClientUsername {
                username: username.clone(),
            },
        );
        match games::join_game(&mut state, connection_id, &game_name) {
            Ok(joined) => outbox.merge(joined),
            Err(e) => {
                state.sessions.unregister(connection_id)?;
                state.gateway.unregister_endpoint(connection_id);
                return Err(e);
            }
        }
        // The player is seated by now; a failed issue only costs them a
        // fresh guest token.
        match self.issue_reconnection_credential(&mut state, connection_id).await {
            Ok(issued) => outbox.merge(issued),
            Err(error) => {
                tracing::warn!(%connection_id, %error, "could not issue reconnection credential");
            }
        }
        state.gateway.flush(outbox)?;

        tracing::info!(%connection_id, %username, game = %game_name, "game server session activated");
        Ok(connection_id)
    }

    async fn handle_message(
        &self,
        connection_id: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), WaypointError> {
        let mut state = self.inner.state.lock().await;
        let outbox = match message {
            ClientMessage::AttemptGameplayAction { action } => {
                games::attempt_gameplay_action(&mut state, connection_id, action)?
            }
            other => return Err(WaypointError::HandlerNotConfigured(other.kind())),
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

        if games::is_seated(&state, connection_id) {
            match self.on_player_disconnected(&mut state, connection_id).await {
                Ok(notified) => outbox.merge(notified),
                Err(error) => {
                    tracing::warn!(%connection_id, %error, "disconnect handling failed");
                }
            }
        }

        if let Err(error) = state.sessions.unregister(connection_id) {
            tracing::debug!(%connection_id, %error, "no session to unregister");
        }
        state.gateway.unregister_endpoint(connection_id);

        outbox.remove_recipients(&[connection_id]);
        // Failures are logged by the gateway.
        let _ = state.gateway.flush(outbox);
        tracing::info!(%connection_id, "game server session closed");
    }
}
