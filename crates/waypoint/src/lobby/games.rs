//! Lobby game lifecycle: create, join, leave, ready up.

use waypoint_game::{Game, GameError, GameRegistry};
use waypoint_protocol::{ConnectionId, GameId, GameName, ServerMessage};
use waypoint_session::{FanOutOptions, IdentityProvider, Outbox, random_hex, random_name};
use waypoint_store::{GameSessionStore, PendingReconnectionStore};

use super::{Lobby, LobbyState};
use crate::WaypointError;

/// How many random names to try before giving up on a generated name.
const NAME_ATTEMPTS: usize = 10;

impl<I, R, G> Lobby<I, R, G>
where
    I: IdentityProvider,
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    /// Creates a game and joins the creator to it.
    ///
    /// An empty `game_name` asks for a generated one.
    pub(super) async fn create_game(
        &self,
        state: &mut LobbyState,
        connection_id: ConnectionId,
        game_name: GameName,
    ) -> Result<Outbox, WaypointError> {
        state.sessions.require(connection_id)?.ensure_can_join_game()?;

        let game_name = if game_name.as_str().trim().is_empty() {
            self.generate_game_name(&state.games).await?
        } else if self.name_is_taken(&state.games, &game_name).await? {
            return Err(GameError::AlreadyExists(game_name).into());
        } else {
            game_name
        };

        state
            .games
            .register(Game::new(GameId::new(random_hex::<8>()), game_name.clone()))?;
        tracing::info!(%connection_id, game = %game_name, "game created");

        join_game(state, connection_id, &game_name)
    }

    /// Picks a random name for which [`name_is_taken`](Self::name_is_taken)
    /// is false.
    async fn generate_game_name(&self, games: &GameRegistry) -> Result<GameName, WaypointError> {
        let mut candidate = GameName::new(random_name());
        for _ in 0..NAME_ATTEMPTS {
            if !self.name_is_taken(games, &candidate).await? {
                return Ok(candidate);
            }
            candidate = GameName::new(random_name());
        }
        Err(GameError::AlreadyExists(candidate).into())
    }

    /// `true` if `name` is used in the registry or in either cross-tier
    /// store. The stores are keyed by name, so a game already handed off
    /// keeps its name until its Game Server tears it down.
    async fn name_is_taken(
        &self,
        games: &GameRegistry,
        name: &GameName,
    ) -> Result<bool, WaypointError> {
        if games.contains(name) {
            return Ok(true);
        }
        let game_sessions = &self.inner.game_sessions;
        if game_sessions.get_pending_setup(name).await?.is_some() {
            return Ok(true);
        }
        Ok(game_sessions.get_active_status(name).await?.is_some())
    }

    /// Flips the sender's ready flag and hands the game off once every
    /// player is ready.
    pub(super) async fn toggle_ready(
        &self,
        state: &mut LobbyState,
        connection_id: ConnectionId,
    ) -> Result<Outbox, WaypointError> {
        let session = state.sessions.require(connection_id)?;
        let game_name = session.require_current_game()?.clone();
        let username = session.username().clone();

        let game = state.games.require_mut(&game_name)?;
        let ready = game.toggle_ready(&username)?;
        let all_ready = game.all_players_ready();
        let channel = game.channel();
        tracing::debug!(%connection_id, game = %game_name, ready, "ready toggled");

        let mut outbox = Outbox::new();
        outbox.push_to_channel(
            &state.sessions,
            &channel,
            ServerMessage::PlayerToggledReadyToStartGame { username },
            FanOutOptions::default(),
        );

        if all_ready {
            outbox.merge(self.hand_off_game(state, &game_name).await?);
        }
        Ok(outbox)
    }
}

/// Joins the sender to an existing, not yet handed-off game.
pub(super) fn join_game(
    state: &mut LobbyState,
    connection_id: ConnectionId,
    game_name: &GameName,
) -> Result<Outbox, WaypointError> {
    let LobbyState {
        sessions, games, ..
    } = state;

    let game = games.require_mut(game_name)?;
    let session = sessions.require_mut(connection_id)?;
    session.ensure_can_join_game()?;
    game.ensure_not_handed_off()?;
    game.add_player(session.username().clone(), session.tagged_user_id().clone())?;

    let channel = game.channel();
    let username = session.username().clone();
    session.set_current_game(game_name.clone());
    session.subscribe(channel.clone())?;

    let mut outbox = Outbox::new();
    outbox.push_to_connection(
        connection_id,
        ServerMessage::GameFullUpdate {
            game: Some(game.snapshot()),
        },
    );
    outbox.push_to_channel(
        sessions,
        &channel,
        ServerMessage::PlayerJoinedGame {
            username: username.clone(),
        },
        FanOutOptions::excluding(connection_id),
    );
    tracing::info!(%connection_id, %username, game = %game_name, "player joined lobby game");
    Ok(outbox)
}

/// Removes the sender from their game, dropping the game once empty.
pub(super) fn leave_game(
    state: &mut LobbyState,
    connection_id: ConnectionId,
) -> Result<Outbox, WaypointError> {
    let LobbyState {
        sessions, games, ..
    } = state;

    let session = sessions.require_mut(connection_id)?;
    let game_name = session.require_current_game()?.clone();
    let username = session.username().clone();

    let game = games.require_mut(&game_name)?;
    game.remove_player(&username)?;
    let channel = game.channel();
    let now_empty = game.is_empty();

    session.clear_current_game();
    session.unsubscribe(&channel)?;

    let mut outbox = Outbox::new();
    outbox.push_to_connection(connection_id, ServerMessage::GameFullUpdate { game: None });

    if now_empty {
        games.unregister(&game_name);
        tracing::info!(game = %game_name, "last player left, lobby game removed");
    } else {
        outbox.push_to_channel(
            sessions,
            &channel,
            ServerMessage::PlayerLeftGame {
                username: username.clone(),
            },
            FanOutOptions::excluding(connection_id),
        );
    }
    tracing::info!(%connection_id, %username, game = %game_name, "player left lobby game");
    Ok(outbox)
}
