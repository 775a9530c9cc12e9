//! Game Server side of reconnection: holding seats open and reclaiming them.

use std::sync::Arc;

use waypoint_protocol::{
    ConnectionId, GameName, ReconnectionKey, ServerMessage, TaggedUserId, Username,
};
use waypoint_session::{FanOutOptions, Outbox, UserSession, guest_reconnection_token};
use waypoint_store::{GameSessionStore, PendingReconnection, PendingReconnectionStore};

use super::{GameServer, GameServerState};
use crate::WaypointError;
use crate::opportunity::ReconnectionOpportunity;

/// What a new Game Server connection is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum GameServerConnectionContext {
    /// The game has not started; the player is arriving from hand-off.
    InitialConnection,
    /// The game is running; the player must reclaim a held seat.
    Reconnection,
}

/// The seat a timed-out opportunity was holding.
#[derive(Debug)]
struct AbandonedSeat {
    key: ReconnectionKey,
    game_name: GameName,
    username: Username,
    tagged_user_id: TaggedUserId,
}

impl<R, G> GameServer<R, G>
where
    R: PendingReconnectionStore,
    G: GameSessionStore,
{
    pub(super) fn evaluate_connection_context(
        &self,
        state: &GameServerState,
        game_name: &GameName,
    ) -> Result<GameServerConnectionContext, WaypointError> {
        if state.games.require(game_name)?.is_started() {
            Ok(GameServerConnectionContext::Reconnection)
        } else {
            Ok(GameServerConnectionContext::InitialConnection)
        }
    }

    /// Claims the open opportunity for `session`'s reconnection key.
    ///
    /// On success the opportunity and its pending record are gone and the
    /// session carries the username the seat was held under.
    ///
    /// # Errors
    /// [`WaypointError::InvalidReconnectionClaim`] if there is no
    /// opportunity, or it was already claimed or has expired.
    pub(super) async fn attempt_reconnection_claim(
        &self,
        state: &mut GameServerState,
        session: &mut UserSession,
    ) -> Result<(), WaypointError> {
        let key = session
            .reconnection_key()
            .ok_or(WaypointError::InvalidReconnectionClaim)?;
        let opportunity = state
            .opportunities
            .get(&key)
            .ok_or(WaypointError::InvalidReconnectionClaim)?;
        if !opportunity.claim() {
            tracing::info!(%key, "reconnection opportunity no longer claimable");
            return Err(WaypointError::InvalidReconnectionClaim);
        }

        state.opportunities.remove(&key);
        self.inner.reconnections.delete(&key).await?;
        session.set_username(opportunity.username().clone());
        tracing::info!(%key, username = %opportunity.username(), "seat reclaimed");
        Ok(())
    }

    /// Quietly claims any opportunity held for a player arriving before
    /// the game started, so its timer cannot evict them later.
    ///
    /// # Errors
    /// [`WaypointError::InvalidReconnectionClaim`] if the opportunity
    /// expired first. Its timeout is already on the way to removing the
    /// player, so they cannot be seated again.
    pub(super) async fn release_open_opportunity(
        &self,
        state: &mut GameServerState,
        session: &mut UserSession,
    ) -> Result<(), WaypointError> {
        let Some(key) = session.reconnection_key() else {
            return Ok(());
        };
        let Some(opportunity) = state.opportunities.remove(&key) else {
            return Ok(());
        };
        if !opportunity.claim() {
            tracing::info!(%key, "returning player lost the race to their own timeout");
            return Err(WaypointError::InvalidReconnectionClaim);
        }
        self.inner.reconnections.delete(&key).await?;
        session.set_username(opportunity.username().clone());
        tracing::debug!(%key, "open opportunity claimed by returning player");
        Ok(())
    }

    /// Gives a guest a fresh single-use reconnection token.
    ///
    /// Authenticated users are keyed by their stable id and get nothing.
    /// A superseded guest token will never be presented again, so any
    /// record still stored under it is deleted.
    pub(super) async fn issue_reconnection_credential(
        &self,
        state: &mut GameServerState,
        connection_id: ConnectionId,
    ) -> Result<Outbox, WaypointError> {
        let mut outbox = Outbox::new();
        let session = state.sessions.require_mut(connection_id)?;
        if !session.is_guest() {
            return Ok(outbox);
        }

        let token = guest_reconnection_token();
        let superseded = session.set_guest_reconnection_token(token.clone())?;
        outbox.push_to_connection(
            connection_id,
            ServerMessage::CacheGuestSessionReconnectionToken { token },
        );

        if let Some(old) = superseded {
            self.inner
                .reconnections
                .delete(&ReconnectionKey::Guest(old))
                .await?;
        }
        Ok(outbox)
    }

    /// Holds a dropped player's seat open.
    ///
    /// Writes the pending record the Lobby will find, locks the game's
    /// input, tells the others, and opens a time-boxed opportunity. A
    /// player with no reconnection key cannot be found again and leaves
    /// the game immediately.
    pub(super) async fn on_player_disconnected(
        &self,
        state: &mut GameServerState,
        connection_id: ConnectionId,
    ) -> Result<Outbox, WaypointError> {
        let session = state.sessions.require(connection_id)?;
        let game_name = session.require_current_game()?.clone();
        let username = session.username().clone();
        let tagged_user_id = session.tagged_user_id().clone();
        let guest_token = session.guest_reconnection_token().cloned();

        let Some(key) = session.reconnection_key() else {
            tracing::warn!(%connection_id, %username, "no reconnection key, seat released");
            return self.leave_game(state, &game_name, &username).await;
        };

        self.inner
            .reconnections
            .write(PendingReconnection {
                tagged_user_id: tagged_user_id.clone(),
                username: username.clone(),
                game_name: game_name.clone(),
                game_server_name: self.inner.config.name.clone(),
                guest_reconnection_token: guest_token,
            })
            .await?;

        let game = state.games.require_mut(&game_name)?;
        game.lock_input(&username)?;
        let mut outbox = Outbox::new();
        outbox.push_to_channel(
            &state.sessions,
            &game.channel(),
            ServerMessage::PlayerDisconnectedWithReconnectionOpportunity {
                username: username.clone(),
            },
            FanOutOptions::excluding(connection_id),
        );

        let timeout = self.inner.config.reconnection_timeout;
        let seat = AbandonedSeat {
            key: key.clone(),
            game_name: game_name.clone(),
            username: username.clone(),
            tagged_user_id,
        };
        let server = Arc::downgrade(&self.inner);
        let opportunity = ReconnectionOpportunity::open(username.clone(), timeout, move || {
            tokio::spawn(async move {
                if let Some(inner) = server.upgrade() {
                    GameServer { inner }.handle_reconnection_timeout(seat).await;
                }
            });
        });
        state.opportunities.add(key, opportunity);

        tracing::info!(
            %connection_id,
            %username,
            game = %game_name,
            ?timeout,
            "player disconnected, seat held"
        );
        Ok(outbox)
    }

    /// Gives up on a player whose reconnection window closed.
    async fn handle_reconnection_timeout(&self, seat: AbandonedSeat) {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let AbandonedSeat {
            key,
            game_name,
            username,
            tagged_user_id,
        } = seat;

        if state
            .opportunities
            .get(&key)
            .is_some_and(|current| !current.is_active())
        {
            state.opportunities.remove(&key);
        }
        if let Err(error) = self.inner.reconnections.delete(&key).await {
            tracing::warn!(%key, %error, "failed to delete pending reconnection");
        }

        let mut outbox = Outbox::new();
        let seated = match state.games.get_mut(&game_name) {
            Some(game) => {
                game.unlock_input(&tagged_user_id);
                outbox.push_to_channel(
                    &state.sessions,
                    &game.channel(),
                    ServerMessage::PlayerReconnectionTimedOut {
                        username: username.clone(),
                    },
                    FanOutOptions::default(),
                );
                game.players().contains(&username)
            }
            None => false,
        };

        if seated {
            match self.leave_game(state, &game_name, &username).await {
                Ok(left) => outbox.merge(left),
                Err(error) => {
                    tracing::warn!(%username, game = %game_name, %error, "leave after timeout failed");
                }
            }
        }

        tracing::info!(%username, game = %game_name, "reconnection window closed");
        // Failures are logged by the gateway.
        let _ = state.gateway.flush(outbox);
    }
}
