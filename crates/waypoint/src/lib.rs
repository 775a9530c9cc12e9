//! # Waypoint
//!
//! Two-tier multiplayer backend: a Lobby where players form games, and
//! Game Servers that host them once everyone is ready.
//!
//! The tiers never call each other. A game moves from the Lobby to a Game
//! Server through a pending setup record, and each player follows it with
//! an encrypted, single-use session claim token. A player who drops out
//! of a running game can come back through the Lobby within a reconnection
//! window and reclaim their seat.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use waypoint::prelude::*;
//!
//! # async fn run() -> Result<(), WaypointError> {
//! let secret = ClaimTokenSecret::generate();
//! let reconnections = InMemoryPendingReconnectionStore::new();
//! let game_sessions = InMemoryGameSessionStore::new();
//!
//! let lobby = Lobby::builder(
//!     InMemoryIdentityProvider::new(),
//!     reconnections.clone(),
//!     game_sessions.clone(),
//!     secret.clone(),
//! )
//! .bind("0.0.0.0:8082")
//! .game_server(GameServerAddress::new("gs-1", "ws://localhost:8083"))
//! .build();
//!
//! let game_server = GameServer::builder(reconnections, game_sessions, secret)
//!     .bind("0.0.0.0:8083")
//!     .name("gs-1")
//!     .build();
//!
//! tokio::try_join!(lobby.serve(), game_server.serve())?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod game_server;
mod gateway;
mod handler;
mod lobby;
mod opportunity;
mod server;

pub use config::{GameServerAddress, GameServerConfig, LobbyConfig};
pub use error::WaypointError;
pub use game_server::{GameServer, GameServerBuilder};
pub use gateway::{ClientEndpoint, OutgoingMessageGateway};
pub use lobby::{Lobby, LobbyBuilder};
pub use opportunity::{ReconnectionOpportunity, ReconnectionOpportunityManager};
pub use server::{Tier, WaypointServer};

/// Everything needed to stand up both tiers with in-memory backing.
pub mod prelude {
    pub use crate::{
        GameServer, GameServerAddress, GameServerConfig, Lobby, LobbyConfig, Tier,
        WaypointError, WaypointServer,
    };
    pub use waypoint_protocol::{ClientMessage, GameName, ServerMessage, Username};
    pub use waypoint_session::{ClaimTokenSecret, IdentityProvider, InMemoryIdentityProvider};
    pub use waypoint_store::{
        GameSessionStore, InMemoryGameSessionStore, InMemoryPendingReconnectionStore,
        PendingReconnectionStore,
    };
}
