//! Integration tests for the in-memory stores.

use waypoint_game::Game;
use waypoint_protocol::{
    GameId, GameName, GameServerName, GuestReconnectionToken, GuestUserId, IdentityProviderId,
    ReconnectionKey, TaggedUserId, Username,
};
use waypoint_store::{
    ActiveGameStatus, GameSessionStore, InMemoryGameSessionStore,
    InMemoryPendingReconnectionStore, PendingGameSetup, PendingReconnection,
    PendingReconnectionStore,
};

fn auth_record(id: u64, game: &str) -> PendingReconnection {
    PendingReconnection {
        tagged_user_id: TaggedUserId::Auth(IdentityProviderId(id)),
        username: Username::new(format!("user-{id}")),
        game_name: GameName::new(game),
        game_server_name: GameServerName::new("gs-1"),
        guest_reconnection_token: None,
    }
}

fn guest_record(token: &str, game: &str) -> PendingReconnection {
    PendingReconnection {
        tagged_user_id: TaggedUserId::Guest(GuestUserId::new("guest")),
        username: Username::new("Bob"),
        game_name: GameName::new(game),
        game_server_name: GameServerName::new("gs-1"),
        guest_reconnection_token: Some(GuestReconnectionToken::new(token)),
    }
}

// =========================================================================
// PendingReconnectionStore
// =========================================================================

#[tokio::test]
async fn test_auth_and_guest_keys_do_not_collide() {
    let store = InMemoryPendingReconnectionStore::new();
    store.write(auth_record(1, "A")).await.unwrap();
    store.write(guest_record("tok", "B")).await.unwrap();

    let auth = store
        .get(&ReconnectionKey::Auth(IdentityProviderId(1)))
        .await
        .unwrap()
        .unwrap();
    let guest = store
        .get(&ReconnectionKey::Guest(GuestReconnectionToken::new("tok")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth.game_name, GameName::new("A"));
    assert_eq!(guest.game_name, GameName::new("B"));
}

#[tokio::test]
async fn test_delete_all_in_game_spares_other_games() {
    let store = InMemoryPendingReconnectionStore::new();
    store.write(auth_record(1, "doomed")).await.unwrap();
    store.write(guest_record("t1", "doomed")).await.unwrap();
    store.write(auth_record(2, "alive")).await.unwrap();

    store.delete_all_in_game(&GameName::new("doomed")).await.unwrap();

    assert_eq!(store.len().await, 1);
    assert!(store
        .get(&ReconnectionKey::Auth(IdentityProviderId(2)))
        .await
        .unwrap()
        .is_some());
}

// =========================================================================
// GameSessionStore
// =========================================================================

#[tokio::test]
async fn test_pending_setup_is_a_snapshot() {
    let store = InMemoryGameSessionStore::new();
    let mut live = Game::new(GameId::new("g-1"), GameName::new("Brave Otter"));
    live.add_player(Username::new("Ada"), TaggedUserId::Auth(IdentityProviderId(1)))
        .unwrap();

    store
        .write_pending_setup(PendingGameSetup::new(live.clone(), 0))
        .await
        .unwrap();
    live.remove_player(&Username::new("Ada")).unwrap();

    let stored = store
        .get_pending_setup(&GameName::new("Brave Otter"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.game.players().len(), 1, "later churn does not leak in");
}

#[tokio::test]
async fn test_setup_and_status_are_separate_key_spaces() {
    let store = InMemoryGameSessionStore::new();
    let name = GameName::new("Brave Otter");
    store
        .write_pending_setup(PendingGameSetup::new(
            Game::new(GameId::new("g-1"), name.clone()),
            0,
        ))
        .await
        .unwrap();
    store
        .write_active_status(ActiveGameStatus {
            game_name: name.clone(),
            game_id: GameId::new("g-1"),
            game_server_name: GameServerName::new("gs-1"),
            last_heartbeat: 0,
        })
        .await
        .unwrap();

    store.delete_pending_setup(&name).await.unwrap();

    assert!(store.get_pending_setup(&name).await.unwrap().is_none());
    assert!(store.get_active_status(&name).await.unwrap().is_some());

    store.delete_active_status(&name).await.unwrap();
    assert!(store.get_active_status(&name).await.unwrap().is_none());
}

#[test]
fn test_pending_reconnection_json_shape() {
    let json = serde_json::to_value(guest_record("tok", "g")).unwrap();
    assert_eq!(json["tagged_user_id"]["type"], "Guest");
    assert_eq!(json["guest_reconnection_token"], "tok");
}
