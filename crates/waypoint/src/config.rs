//! Tier configuration.

use std::time::Duration;

use waypoint_protocol::GameServerName;

/// A Game Server as the Lobby knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameServerAddress {
    pub name: GameServerName,
    /// WebSocket URL clients are told to connect to.
    pub url: String,
}

impl GameServerAddress {
    pub fn new(name: impl Into<GameServerName>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Configuration for a [`Lobby`](crate::Lobby).
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Address the WebSocket listener binds to. Default: `127.0.0.1:8082`.
    pub bind_addr: String,
    /// Game Servers that games can be handed off to, picked round-robin.
    pub game_servers: Vec<GameServerAddress>,
    /// An `ActiveGameStatus` older than this is treated as gone.
    /// Default: 30 s, three missed heartbeats.
    pub active_game_stale_after: Duration,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8082".to_string(),
            game_servers: Vec::new(),
            active_game_stale_after: Duration::from_secs(30),
        }
    }
}

/// Configuration for a [`GameServer`](crate::GameServer).
#[derive(Debug, Clone)]
pub struct GameServerConfig {
    /// Address the WebSocket listener binds to. Default: `127.0.0.1:8083`.
    pub bind_addr: String,
    /// Name this server writes into reconnection and status records. It
    /// must match the name the Lobby has for it.
    pub name: GameServerName,
    /// How long a disconnected player may take to come back. Default: 120 s.
    pub reconnection_timeout: Duration,
    /// How often `ActiveGameStatus` records are refreshed. Default: 10 s.
    pub heartbeat_interval: Duration,
}

impl Default for GameServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8083".to_string(),
            name: GameServerName::new("game-server-1"),
            reconnection_timeout: Duration::from_secs(120),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_config_default_staleness_is_three_heartbeats() {
        let lobby = LobbyConfig::default();
        let server = GameServerConfig::default();
        assert_eq!(lobby.active_game_stale_after, server.heartbeat_interval * 3);
    }

    #[test]
    fn test_game_server_config_default_reconnection_window() {
        assert_eq!(
            GameServerConfig::default().reconnection_timeout,
            Duration::from_secs(120)
        );
    }
}
