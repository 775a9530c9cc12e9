//! Hosted game lifecycle: materialize, seat, start, act, leave.

use waypoint_game::{Game, GameError};
use waypoint_protocol::{ConnectionId, GameName, ServerMessage, Username, unix_millis};
use waypoint_session::{CLAIM_TOKEN_TTL, FanOutOptions, Outbox, UserSessionRegistry};
use waypoint_store::{ActiveGameStatus, GameSessionStore, PendingReconnectionStore};

use super::{GameServer, GameServerState};
use crate::WaypointError;

impl<R, G> GameServer<R, G>
where
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    /// Makes sure `game_name` is hosted here.
    ///
    /// The first player to arrive materializes the game from the Lobby's
    /// `PendingGameSetup`. The setup is consumed, and an `ActiveGameStatus`
    /// is written at once so reconnecting players can find the game
    /// before the first heartbeat.
    pub(super) async fn get_or_initialize_game(
        &self,
        state: &mut GameServerState,
        game_name: &GameName,
    ) -> Result<(), WaypointError> {
        if state.games.contains(game_name) {
            return Ok(());
        }

        let game_sessions = &self.inner.game_sessions;
        let now = unix_millis();
        let setup = match game_sessions.get_pending_setup(game_name).await? {
            Some(setup) if setup.is_expired(now, CLAIM_TOKEN_TTL) => {
                tracing::info!(game = %game_name, created_at = setup.created_at, "pending game setup expired");
                game_sessions.delete_pending_setup(game_name).await?;
                None
            }
            other => other,
        };
        let Some(setup) = setup else {
            return Err(WaypointError::GameSetupNotFound(game_name.clone()));
        };

        let game = setup.game;
        let status = ActiveGameStatus {
            game_name: game.name().clone(),
            game_id: game.id().clone(),
            game_server_name: self.inner.config.name.clone(),
            last_heartbeat: now,
        };
        let players = game.players().len();
        state.games.register(game)?;
        game_sessions.delete_pending_setup(game_name).await?;
        game_sessions.write_active_status(status).await?;

        tracing::info!(game = %game_name, players, "game materialized from pending setup");
        Ok(())
    }
}

/// `true` if the connection's session is seated in a game hosted here.
pub(super) fn is_seated(state: &GameServerState, connection_id: ConnectionId) -> bool {
    let Some(session) = state.sessions.get(connection_id) else {
        return false;
    };
    session
        .current_game_name()
        .and_then(|name| state.games.get(name))
        .is_some_and(|game| game.players().contains(session.username()))
}

/// `true` once every player of `game` has a live session in it.
fn all_players_connected(sessions: &UserSessionRegistry, game: &Game) -> bool {
    game.players()
        .usernames()
        .all(|username| sessions.expected_session_in_game(username, game.name()).is_some())
}

/// Marks `game` started and tells everyone in it.
fn start_game(sessions: &UserSessionRegistry, game: &mut Game) -> Result<Outbox, WaypointError> {
    let time_started = game.mark_started(unix_millis())?;
    let mut outbox = Outbox::new();
    outbox.push_to_channel(
        sessions,
        &game.channel(),
        ServerMessage::GameStarted { time_started },
        FanOutOptions::default(),
    );
    tracing::info!(game = %game.name(), players = game.players().len(), "game started");
    Ok(outbox)
}

/// Seats a registered session in the game its claim token named.
///
/// Releases the player's input-lock entry before the snapshot is taken,
/// so the player never sees their own absence locking the game.
pub(super) fn join_game(
    state: &mut GameServerState,
    connection_id: ConnectionId,
    game_name: &GameName,
) -> Result<Outbox, WaypointError> {
    let GameServerState {
        sessions, games, ..
    } = state;

    let game = games.require_mut(game_name)?;
    let session = sessions.require_mut(connection_id)?;
    let username = session.username().clone();
    let seat = game.require_player(&username)?.tagged_user_id().clone();

    game.unlock_input(&seat);
    let channel = game.channel();
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
    tracing::info!(%connection_id, %username, game = %game_name, "player seated");

    if !game.is_started() && all_players_connected(sessions, game) {
        outbox.merge(start_game(sessions, game)?);
    }
    Ok(outbox)
}

impl<R, G> GameServer<R, G>
where
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    /// Removes `username` from a hosted game.
    ///
    /// An emptied game is torn down along with its liveness record and
    /// every reconnection record pointing at it. Otherwise, a game still
    /// waiting for players starts if the departure leaves everyone
    /// remaining connected.
    pub(super) async fn leave_game(
        &self,
        state: &mut GameServerState,
        game_name: &GameName,
        username: &Username,
    ) -> Result<Outbox, WaypointError> {
        let GameServerState {
            sessions, games, ..
        } = state;

        let game = games.require_mut(game_name)?;
        let mut outbox = Outbox::new();
        outbox.push_to_channel(
            sessions,
            &game.channel(),
            ServerMessage::PlayerLeftGame {
                username: username.clone(),
            },
            FanOutOptions::default(),
        );
        game.remove_player(username)?;
        tracing::info!(%username, game = %game_name, "player removed from hosted game");

        if game.is_empty() {
            games.unregister(game_name);
            self.inner.game_sessions.delete_active_status(game_name).await?;
            self.inner.reconnections.delete_all_in_game(game_name).await?;
            tracing::info!(game = %game_name, "last player gone, game torn down");
        } else if !game.is_started() && all_players_connected(sessions, game) {
            outbox.merge(start_game(sessions, game)?);
        }
        Ok(outbox)
    }
}

/// Broadcasts a gameplay action to the sender's game.
///
/// The action itself is opaque here. It is refused outside a game,
/// before the game starts, and while any player is mid-reconnection.
pub(super) fn attempt_gameplay_action(
    state: &mut GameServerState,
    connection_id: ConnectionId,
    action: String,
) -> Result<Outbox, WaypointError> {
    let session = state.sessions.require(connection_id)?;
    let game_name = session.require_current_game()?;
    let game = state.games.require(game_name)?;
    if !game.players().contains(session.username()) {
        return Err(GameError::PlayerNotFound(session.username().clone()).into());
    }
    game.require_started()?;
    game.ensure_accepting_input()?;

    let username = session.username().clone();
    tracing::debug!(%connection_id, %username, game = %game_name, "gameplay action accepted");

    let mut outbox = Outbox::new();
    outbox.push_to_channel(
        &state.sessions,
        &game.channel(),
        ServerMessage::PlayerTookAction { username, action },
        FanOutOptions::default(),
    );
    Ok(outbox)
}
