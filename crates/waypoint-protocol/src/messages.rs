//! Message catalogs for both directions of the wire.
//!
//! Every frame is a JSON object `{ "type": ..., "data": ... }`. serde's
//! adjacently tagged representation (`#[serde(tag = "type", content =
//! "data")]`) produces exactly that shape, and unit variants simply omit
//! `data`.

use serde::{Deserialize, Serialize};

use crate::{GameId, GameName, GuestReconnectionToken, UnixMillis, Username};

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// A player as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Display name the player is registered under in the game.
    pub username: Username,
    /// Whether the player has toggled ready in the Lobby.
    pub ready: bool,
}

/// Full client-facing view of a game, sent in `GameFullUpdate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub id: GameId,
    pub name: GameName,
    pub players: Vec<PlayerSnapshot>,
    pub time_started: Option<UnixMillis>,
    pub time_handed_off: Option<UnixMillis>,
    /// `true` while any member is mid-reconnection.
    pub input_locked: bool,
}

/// Where to go next and what to present when you get there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInstructions {
    /// WebSocket URL of the target Game Server.
    pub url: String,
    /// Opaque, encrypted session claim token. Passed back verbatim in the
    /// `session_claim_token` query parameter.
    pub encrypted_session_claim_token: String,
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Intents a client can send to either tier.
///
/// Which tier accepts which intent is up to the tier; a type it does not
/// handle is answered with an error rather than ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Create a game. An empty name asks the Lobby to pick one.
    CreateGame { game_name: GameName },
    /// Join an existing Lobby game.
    JoinGame { game_name: GameName },
    /// Leave the current Lobby game.
    LeaveGame,
    /// Flip this player's ready flag in the current Lobby game.
    ToggleReadyToStartGame,
    /// Perform a gameplay action on the Game Server. The action payload
    /// is opaque to the framework.
    AttemptGameplayAction { action: String },
}

impl ClientMessage {
    /// Name of the variant, as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateGame { .. } => "CreateGame",
            Self::JoinGame { .. } => "JoinGame",
            Self::LeaveGame => "LeaveGame",
            Self::ToggleReadyToStartGame => "ToggleReadyToStartGame",
            Self::AttemptGameplayAction { .. } => "AttemptGameplayAction",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Everything either tier can push to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// The name this connection is known by.
    ClientUsername { username: Username },

    /// Guests only: remember this token and present it as
    /// `guest_reconnection_token` on the next Lobby connection.
    CacheGuestSessionReconnectionToken { token: GuestReconnectionToken },

    /// A recoverable failure handling the client's last message.
    ErrorMessage { message: String },

    /// Complete state of the client's current game, or `None` once they
    /// have left it.
    GameFullUpdate { game: Option<GameSnapshot> },

    PlayerJoinedGame { username: Username },
    PlayerLeftGame { username: Username },
    PlayerToggledReadyToStartGame { username: Username },

    /// A member dropped from an in-progress game and may still come back.
    PlayerDisconnectedWithReconnectionOpportunity { username: Username },

    /// A disconnected member did not come back in time.
    PlayerReconnectionTimedOut { username: Username },

    /// Every expected player reached the Game Server.
    GameStarted { time_started: UnixMillis },

    /// Hand-off: connect to this Game Server with this claim token.
    GameServerConnectionInstructions {
        connection_instructions: ConnectionInstructions,
    },

    /// A member performed a gameplay action.
    PlayerTookAction { username: Username, action: String },
}

impl ServerMessage {
    /// Shorthand for an [`ErrorMessage`](Self::ErrorMessage).
    pub fn error(message: impl Into<String>) -> Self {
        Self::ErrorMessage {
            message: message.into(),
        }
    }
}
