//! Pending setups and liveness records, keyed by game name.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use waypoint_protocol::GameName;

use crate::{ActiveGameStatus, PendingGameSetup, StoreError};

/// Async key-value store for the two game-scoped cross-tier records.
///
/// Both record kinds are keyed by game name and live in separate key
/// spaces: deleting a setup never touches a status and vice versa.
pub trait GameSessionStore: Send + Sync + 'static {
    fn write_pending_setup(
        &self,
        setup: PendingGameSetup,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_pending_setup(
        &self,
        game_name: &GameName,
    ) -> impl Future<Output = Result<Option<PendingGameSetup>, StoreError>> + Send;

    fn delete_pending_setup(
        &self,
        game_name: &GameName,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn write_active_status(
        &self,
        status: ActiveGameStatus,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_active_status(
        &self,
        game_name: &GameName,
    ) -> impl Future<Output = Result<Option<ActiveGameStatus>, StoreError>> + Send;

    fn delete_active_status(
        &self,
        game_name: &GameName,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// A [`GameSessionStore`] held in process memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGameSessionStore {
    setups: Arc<RwLock<HashMap<GameName, PendingGameSetup>>>,
    statuses: Arc<RwLock<HashMap<GameName, ActiveGameStatus>>>,
}

impl InMemoryGameSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameSessionStore for InMemoryGameSessionStore {
    async fn write_pending_setup(&self, setup: PendingGameSetup) -> Result<(), StoreError> {
        tracing::debug!(game = %setup.game.name(), "pending game setup written");
        self.setups
            .write()
            .await
            .insert(setup.game.name().clone(), setup);
        Ok(())
    }

    async fn get_pending_setup(
        &self,
        game_name: &GameName,
    ) -> Result<Option<PendingGameSetup>, StoreError> {
        Ok(self.setups.read().await.get(game_name).cloned())
    }

    async fn delete_pending_setup(&self, game_name: &GameName) -> Result<(), StoreError> {
        self.setups.write().await.remove(game_name);
        Ok(())
    }

    async fn write_active_status(&self, status: ActiveGameStatus) -> Result<(), StoreError> {
        tracing::trace!(
            game = %status.game_name,
            server = %status.game_server_name,
            last_heartbeat = status.last_heartbeat,
            "active game status written"
        );
        self.statuses
            .write()
            .await
            .insert(status.game_name.clone(), status);
        Ok(())
    }

    async fn get_active_status(
        &self,
        game_name: &GameName,
    ) -> Result<Option<ActiveGameStatus>, StoreError> {
        Ok(self.statuses.read().await.get(game_name).cloned())
    }

    async fn delete_active_status(&self, game_name: &GameName) -> Result<(), StoreError> {
        self.statuses.write().await.remove(game_name);
        Ok(())
    }
}
