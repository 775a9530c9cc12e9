//! Error types for the game layer.
//!
//! Every variant here is recoverable: it is reported to the one client
//! whose request caused it, and that client's connection stays open. The
//! display strings are written for that client to read.

use waypoint_protocol::{GameName, Username};

/// Errors that can occur during game operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// No game with this name is registered.
    #[error("Game not found")]
    NotFound(GameName),

    /// A game with this name is already registered.
    #[error("A game by that name already exists")]
    AlreadyExists(GameName),

    /// The game's start time is already set.
    #[error("The game was already started")]
    AlreadyStarted(GameName),

    /// The operation needs a game that has started.
    #[error("The game has not started yet")]
    NotStarted(GameName),

    /// The game has already been handed off to a Game Server.
    #[error("The game was already handed off to the game server")]
    AlreadyHandedOff(GameName),

    /// A member is mid-reconnection, so gameplay input is paused.
    #[error("That game is not currently accepting player inputs")]
    InputLocked(GameName),

    /// No player record exists for this username.
    #[error("No player was found")]
    PlayerNotFound(Username),

    /// A player with this username is already in the game.
    #[error("A player by that name is already in the game")]
    PlayerAlreadyInGame(Username),
}
