//! Pending reconnection storage.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use waypoint_protocol::{GameName, GuestReconnectionToken, IdentityProviderId, ReconnectionKey};

use crate::{PendingReconnection, StoreError};

/// Async key-value store of [`PendingReconnection`] records.
///
/// At most one record exists per [`ReconnectionKey`]; a write replaces
/// whatever was stored under the same key. Implementations must give
/// read-your-writes consistency to a single caller.
pub trait PendingReconnectionStore: Send + Sync + 'static {
    /// Stores `record` under its own key.
    ///
    /// # Errors
    /// [`StoreError::MissingReconnectionKey`] for a guest record without
    /// a token.
    fn write(
        &self,
        record: PendingReconnection,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get(
        &self,
        key: &ReconnectionKey,
    ) -> impl Future<Output = Result<Option<PendingReconnection>, StoreError>> + Send;

    /// Removes the record under `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &ReconnectionKey) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes every record that points at `game_name`.
    fn delete_all_in_game(
        &self,
        game_name: &GameName,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, Default)]
struct Maps {
    by_auth: HashMap<IdentityProviderId, PendingReconnection>,
    by_guest: HashMap<GuestReconnectionToken, PendingReconnection>,
}

/// A [`PendingReconnectionStore`] held in process memory.
///
/// Cloning shares the same maps, so one instance can be handed to the
/// Lobby and every Game Server of a single-process deployment.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPendingReconnectionStore {
    maps: Arc<RwLock<Maps>>,
}

impl InMemoryPendingReconnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across both key spaces.
    pub async fn len(&self) -> usize {
        let maps = self.maps.read().await;
        maps.by_auth.len() + maps.by_guest.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl PendingReconnectionStore for InMemoryPendingReconnectionStore {
    async fn write(&self, record: PendingReconnection) -> Result<(), StoreError> {
        let key = record
            .key()
            .ok_or_else(|| StoreError::MissingReconnectionKey(record.tagged_user_id.clone()))?;
        tracing::debug!(%key, game = %record.game_name, "pending reconnection written");

        let mut maps = self.maps.write().await;
        match key {
            ReconnectionKey::Auth(id) => {
                maps.by_auth.insert(id, record);
            }
            ReconnectionKey::Guest(token) => {
                maps.by_guest.insert(token, record);
            }
        }
        Ok(())
    }

    async fn get(&self, key: &ReconnectionKey) -> Result<Option<PendingReconnection>, StoreError> {
        let maps = self.maps.read().await;
        let record = match key {
            ReconnectionKey::Auth(id) => maps.by_auth.get(id),
            ReconnectionKey::Guest(token) => maps.by_guest.get(token),
        };
        Ok(record.cloned())
    }

    async fn delete(&self, key: &ReconnectionKey) -> Result<(), StoreError> {
        let mut maps = self.maps.write().await;
        let removed = match key {
            ReconnectionKey::Auth(id) => maps.by_auth.remove(id),
            ReconnectionKey::Guest(token) => maps.by_guest.remove(token),
        };
        if removed.is_some() {
            tracing::debug!(%key, "pending reconnection deleted");
        }
        Ok(())
    }

    async fn delete_all_in_game(&self, game_name: &GameName) -> Result<(), StoreError> {
        let mut maps = self.maps.write().await;
        maps.by_auth.retain(|_, r| &r.game_name != game_name);
        maps.by_guest.retain(|_, r| &r.game_name != game_name);
        tracing::debug!(game = %game_name, "pending reconnections cleared for game");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use waypoint_protocol::{GameServerName, GuestUserId, TaggedUserId, Username};

    use super::*;

    fn guest_record(token: &str, game: &str) -> PendingReconnection {
        PendingReconnection {
            tagged_user_id: TaggedUserId::Guest(GuestUserId::new(format!("g-{token}"))),
            username: Username::new("Bob"),
            game_name: GameName::new(game),
            game_server_name: GameServerName::new("gs-1"),
            guest_reconnection_token: Some(GuestReconnectionToken::new(token)),
        }
    }

    #[tokio::test]
    async fn test_write_guest_without_token_fails() {
        let store = InMemoryPendingReconnectionStore::new();
        let mut record = guest_record("t", "g");
        record.guest_reconnection_token = None;

        let result = store.write(record).await;
        assert!(matches!(result, Err(StoreError::MissingReconnectionKey(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_write_replaces_same_key() {
        let store = InMemoryPendingReconnectionStore::new();
        store.write(guest_record("t", "first")).await.unwrap();
        store.write(guest_record("t", "second")).await.unwrap();

        let key = ReconnectionKey::Guest(GuestReconnectionToken::new("t"));
        let got = store.get(&key).await.unwrap().unwrap();
        assert_eq!(got.game_name, GameName::new("second"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = InMemoryPendingReconnectionStore::new();
        let key = ReconnectionKey::Auth(IdentityProviderId(1));
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_clone_shares_records() {
        let lobby_side = InMemoryPendingReconnectionStore::new();
        let server_side = lobby_side.clone();
        server_side.write(guest_record("t", "g")).await.unwrap();

        let key = ReconnectionKey::Guest(GuestReconnectionToken::new("t"));
        assert!(lobby_side.get(&key).await.unwrap().is_some());
    }
}
