//! Cross-tier stores for Waypoint.
//!
//! The Lobby and the Game Servers never call each other. They coordinate
//! only through three kinds of record:
//!
//! | Record | Written by | Read by |
//! |--------|-----------|---------|
//! | [`PendingGameSetup`] | Lobby at hand-off | Game Server on first join |
//! | [`ActiveGameStatus`] | Game Server heartbeat | Lobby on reconnect |
//! | [`PendingReconnection`] | Game Server on disconnect | Lobby on reconnect |
//!
//! The store traits are async because a production deployment puts a
//! networked cache behind them. The in-memory implementations here are
//! what tests and single-process deployments use.

#![allow(async_fn_in_trait)]

mod error;
mod game_session;
mod reconnection;
mod records;

pub use error::StoreError;
pub use game_session::{GameSessionStore, InMemoryGameSessionStore};
pub use reconnection::{InMemoryPendingReconnectionStore, PendingReconnectionStore};
pub use records::{ActiveGameStatus, PendingGameSetup, PendingReconnection};
