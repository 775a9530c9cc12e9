//! Runs a Lobby and one Game Server in a single process.
//!
//! Both tiers share the in-memory stores, which stand in for the shared
//! cache a multi-host deployment would use.
//!
//! Environment:
//! - `WAYPOINT_LOBBY_ADDR` (default `0.0.0.0:8082`)
//! - `WAYPOINT_GAME_SERVER_ADDR` (default `0.0.0.0:8083`)
//! - `WAYPOINT_GAME_SERVER_URL`, the URL clients are sent to
//!   (default `ws://localhost:8083`)
//! - `WAYPOINT_CLAIM_SECRET`, base64 of 32 bytes. Generated when unset,
//!   which only works while every tier lives in this process.
//! - `RUST_LOG` (default `info`)

use waypoint::prelude::*;

const GAME_SERVER_NAME: &str = "game-server-1";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    lobby_addr: String,
    game_server_addr: String,
    game_server_url: String,
    claim_secret: Option<String>,
}

impl Settings {
    /// Reads settings through `lookup`, falling back to defaults for
    /// anything unset or empty.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            lobby_addr: get("WAYPOINT_LOBBY_ADDR", "0.0.0.0:8082"),
            game_server_addr: get("WAYPOINT_GAME_SERVER_ADDR", "0.0.0.0:8083"),
            game_server_url: get("WAYPOINT_GAME_SERVER_URL", "ws://localhost:8083"),
            claim_secret: lookup("WAYPOINT_CLAIM_SECRET").filter(|value| !value.is_empty()),
        }
    }

    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn secret(&self) -> Result<ClaimTokenSecret, WaypointError> {
        match &self.claim_secret {
            Some(encoded) => Ok(ClaimTokenSecret::from_base64(encoded)?),
            None => {
                tracing::warn!("WAYPOINT_CLAIM_SECRET not set, using a generated secret");
                Ok(ClaimTokenSecret::generate())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env();
    let secret = settings.secret()?;
    let reconnections = InMemoryPendingReconnectionStore::new();
    let game_sessions = InMemoryGameSessionStore::new();

    let lobby = Lobby::builder(
        InMemoryIdentityProvider::new(),
        reconnections.clone(),
        game_sessions.clone(),
        secret.clone(),
    )
    .bind(&settings.lobby_addr)
    .game_server(GameServerAddress::new(
        GAME_SERVER_NAME,
        settings.game_server_url.clone(),
    ))
    .build();

    let game_server = GameServer::builder(reconnections, game_sessions, secret)
        .bind(&settings.game_server_addr)
        .name(GAME_SERVER_NAME)
        .build();

    tracing::info!(
        lobby = %settings.lobby_addr,
        game_server = %settings.game_server_addr,
        url = %settings.game_server_url,
        "starting two-tier waypoint"
    );
    tokio::try_join!(lobby.serve(), game_server.serve())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_settings_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings.lobby_addr, "0.0.0.0:8082");
        assert_eq!(settings.game_server_addr, "0.0.0.0:8083");
        assert_eq!(settings.game_server_url, "ws://localhost:8083");
        assert!(settings.claim_secret.is_none());
    }

    #[test]
    fn test_settings_empty_values_fall_back() {
        let settings = Settings::from_lookup(lookup(&[
            ("WAYPOINT_LOBBY_ADDR", ""),
            ("WAYPOINT_CLAIM_SECRET", ""),
        ]));
        assert_eq!(settings.lobby_addr, "0.0.0.0:8082");
        assert!(settings.claim_secret.is_none());
    }

    #[test]
    fn test_settings_secret_round_trips_through_env() {
        let original = ClaimTokenSecret::generate();
        let encoded = original.to_base64();
        let settings = Settings::from_lookup(lookup(&[("WAYPOINT_CLAIM_SECRET", &encoded)]));

        let secret = settings.secret().unwrap();
        assert!(secret == original);
    }

    #[test]
    fn test_settings_bad_secret_rejected() {
        let settings = Settings::from_lookup(lookup(&[("WAYPOINT_CLAIM_SECRET", "short")]));
        assert!(settings.secret().is_err());
    }
}
