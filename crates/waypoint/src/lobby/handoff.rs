//! Game hand-off: from a ready Lobby game to per-player claim tokens.

use waypoint_protocol::{ConnectionInstructions, GameName, ServerMessage, unix_millis};
use waypoint_session::{GameServerSessionClaimToken, IdentityProvider, Outbox};
use waypoint_store::{GameSessionStore, PendingGameSetup, PendingReconnectionStore};

use super::{Lobby, LobbyState};
use crate::WaypointError;
use crate::config::GameServerAddress;

impl<I, R, G> Lobby<I, R, G>
where
    I: IdentityProvider,
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    /// Sends every connected player of `game_name` to a Game Server.
    ///
    /// 1. Pick the target server (round-robin)
    /// 2. Mark the game handed off; a second hand-off is rejected
    /// 3. Write a deep copy as the `PendingGameSetup`
    /// 4. Give each player's session its own claim token and instructions
    ///
    /// No "game started" is sent from here. The Game Server starts the
    /// game once every player has arrived.
    pub(super) async fn hand_off_game(
        &self,
        state: &mut LobbyState,
        game_name: &GameName,
    ) -> Result<Outbox, WaypointError> {
        let server = self.next_game_server(state)?.clone();
        let now = unix_millis();

        let game = state.games.require_mut(game_name)?;
        game.mark_handed_off(now)?;
        let snapshot = game.clone();
        self.inner
            .game_sessions
            .write_pending_setup(PendingGameSetup::new(snapshot, now))
            .await?;

        let game = state.games.require(game_name)?;
        let mut outbox = Outbox::new();
        for username in game.players().usernames() {
            let Some(session) = state.sessions.expected_session_in_game(username, game_name) else {
                tracing::debug!(%username, game = %game_name, "player has no live session, no token issued");
                continue;
            };

            let token = GameServerSessionClaimToken::new(
                game_name.clone(),
                session.username().clone(),
                session.tagged_user_id().clone(),
                session.guest_reconnection_token().cloned(),
            );
            let encrypted_session_claim_token = self.inner.claim_codec.encode(&token)?;
            outbox.push_to_connection(
                session.connection_id(),
                ServerMessage::GameServerConnectionInstructions {
                    connection_instructions: ConnectionInstructions {
                        url: server.url.clone(),
                        encrypted_session_claim_token,
                    },
                },
            );
        }

        tracing::info!(
            game = %game_name,
            server = %server.name,
            tokens = outbox.len(),
            "game handed off"
        );
        Ok(outbox)
    }

    /// The next Game Server in round-robin order.
    fn next_game_server<'a>(
        &'a self,
        state: &mut LobbyState,
    ) -> Result<&'a GameServerAddress, WaypointError> {
        let servers = &self.inner.config.game_servers;
        if servers.is_empty() {
            return Err(WaypointError::NoGameServers);
        }
        let index = state.next_game_server % servers.len();
        state.next_game_server = state.next_game_server.wrapping_add(1);
        servers.get(index).ok_or(WaypointError::NoGameServers)
    }
}
