//! Records shared between the Lobby and Game Servers.
//!
//! These are the only state both tiers see. Every cross-tier decision is
//! made by writing or reading one of them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use waypoint_game::Game;
use waypoint_protocol::{
    GameId, GameName, GameServerName, GuestReconnectionToken, ReconnectionKey, TaggedUserId,
    UnixMillis, Username,
};

fn millis(duration: Duration) -> UnixMillis {
    UnixMillis::try_from(duration.as_millis()).unwrap_or(UnixMillis::MAX)
}

/// "This user may reclaim their seat in this game, on this server."
///
/// Written by a Game Server when a player drops out of a hosted game.
/// Deleted when the seat is reclaimed, when the reconnection window
/// closes, or when the game ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReconnection {
    pub tagged_user_id: TaggedUserId,
    /// Name the player is seated under.
    pub username: Username,
    pub game_name: GameName,
    pub game_server_name: GameServerName,
    /// Present for guests only; it is their reconnection key.
    pub guest_reconnection_token: Option<GuestReconnectionToken>,
}

impl PendingReconnection {
    /// The key this record is stored under, if it has one.
    ///
    /// Guests without a token have no key and cannot be stored.
    pub fn key(&self) -> Option<ReconnectionKey> {
        match &self.tagged_user_id {
            TaggedUserId::Auth(id) => Some(ReconnectionKey::Auth(*id)),
            TaggedUserId::Guest(_) => self
                .guest_reconnection_token
                .clone()
                .map(ReconnectionKey::Guest),
        }
    }
}

/// A game on its way from the Lobby to a Game Server.
///
/// `game` is a deep copy taken at hand-off time; the Lobby's live copy
/// keeps changing afterwards and that must not leak into this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGameSetup {
    pub game: Game,
    pub created_at: UnixMillis,
}

impl PendingGameSetup {
    pub fn new(game: Game, created_at: UnixMillis) -> Self {
        Self { game, created_at }
    }

    /// `true` once more than `ttl` has passed since the setup was written.
    pub fn is_expired(&self, now: UnixMillis, ttl: Duration) -> bool {
        now.saturating_sub(self.created_at) > millis(ttl)
    }
}

/// Liveness record for a hosted game, refreshed by its server's heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveGameStatus {
    pub game_name: GameName,
    pub game_id: GameId,
    pub game_server_name: GameServerName,
    pub last_heartbeat: UnixMillis,
}

impl ActiveGameStatus {
    /// `true` once more than `threshold` has passed since the last heartbeat.
    pub fn is_stale(&self, now: UnixMillis, threshold: Duration) -> bool {
        now.saturating_sub(self.last_heartbeat) > millis(threshold)
    }
}
