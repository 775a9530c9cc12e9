//! Lobby side of reconnection: spotting players with a seat waiting.

use waypoint_protocol::{ConnectionInstructions, unix_millis};
use waypoint_session::{GameServerSessionClaimToken, IdentityProvider, UserSession};
use waypoint_store::{GameSessionStore, PendingReconnection, PendingReconnectionStore};

use super::Lobby;
use crate::WaypointError;

/// What a new Lobby connection is for.
#[derive(Debug)]
pub(crate) enum LobbyConnectionContext {
    /// A normal visit: the player takes part in the Lobby.
    InitialConnection,
    /// The player has a seat in a live game and only passes through.
    Reconnection(PendingReconnection),
}

impl<I, R, G> Lobby<I, R, G>
where
    I: IdentityProvider,
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    /// Decides whether `session` is coming back to a running game.
    ///
    /// It is, if a pending reconnection exists for its key and the game
    /// that record points at still has a fresh `ActiveGameStatus`. A
    /// stale status means the hosting server stopped heartbeating; the
    /// status and the reconnection record are deleted and the player is
    /// treated as new.
    pub(super) async fn evaluate_connection_context(
        &self,
        session: &UserSession,
    ) -> Result<LobbyConnectionContext, WaypointError> {
        let Some(key) = session.reconnection_key() else {
            return Ok(LobbyConnectionContext::InitialConnection);
        };
        let Some(pending) = self.inner.reconnections.get(&key).await? else {
            return Ok(LobbyConnectionContext::InitialConnection);
        };

        let game_sessions = &self.inner.game_sessions;
        match game_sessions.get_active_status(&pending.game_name).await? {
            None => {
                tracing::debug!(%key, game = %pending.game_name, "pending reconnection for a game that is gone");
                Ok(LobbyConnectionContext::InitialConnection)
            }
            Some(status)
                if status.is_stale(unix_millis(), self.inner.config.active_game_stale_after) =>
            {
                tracing::info!(
                    %key,
                    game = %status.game_name,
                    server = %status.game_server_name,
                    last_heartbeat = status.last_heartbeat,
                    "active game status is stale, dropping reconnection"
                );
                game_sessions.delete_active_status(&status.game_name).await?;
                self.inner.reconnections.delete(&key).await?;
                Ok(LobbyConnectionContext::InitialConnection)
            }
            Some(_) => Ok(LobbyConnectionContext::Reconnection(pending)),
        }
    }

    /// Builds the instructions that send a reconnecting player back to
    /// the server hosting their game.
    ///
    /// The claim token is minted from the pending record, not from the
    /// Lobby session: the record holds the identity the player's seat is
    /// registered under.
    pub(super) fn reconnection_instructions(
        &self,
        pending: &PendingReconnection,
    ) -> Result<ConnectionInstructions, WaypointError> {
        let server = self
            .inner
            .config
            .game_servers
            .iter()
            .find(|s| s.name == pending.game_server_name)
            .ok_or_else(|| WaypointError::UnknownGameServer(pending.game_server_name.clone()))?;

        let token = GameServerSessionClaimToken::new(
            pending.game_name.clone(),
            pending.username.clone(),
            pending.tagged_user_id.clone(),
            pending.guest_reconnection_token.clone(),
        );
        Ok(ConnectionInstructions {
            url: server.url.clone(),
            encrypted_session_claim_token: self.inner.claim_codec.encode(&token)?,
        })
    }
}
