//! Integration tests for a game's trip from Lobby to Game Server.

use waypoint_game::{Game, GameError, GameRegistry};
use waypoint_protocol::{GameId, GameName, GuestUserId, IdentityProviderId, TaggedUserId, Username};

fn lobby_game() -> Game {
    let mut game = Game::new(GameId::new("g-42"), GameName::new("Brave Otter"));
    game.add_player(Username::new("Ada"), TaggedUserId::Auth(IdentityProviderId(1)))
        .unwrap();
    game.add_player(
        Username::new("Bob"),
        TaggedUserId::Guest(GuestUserId::new("guest-bob")),
    )
    .unwrap();
    game
}

// =========================================================================
// Hand-off
// =========================================================================

#[test]
fn test_handoff_copy_survives_lobby_cleanup() {
    let mut lobby = GameRegistry::new();
    lobby.register(lobby_game()).unwrap();

    let name = GameName::new("Brave Otter");
    let game = lobby.require_mut(&name).unwrap();
    game.toggle_ready(&Username::new("Ada")).unwrap();
    game.toggle_ready(&Username::new("Bob")).unwrap();
    assert!(game.all_players_ready());
    game.mark_handed_off(1_000).unwrap();

    let pending = game.clone();

    // The Lobby forgets the game once its players leave.
    lobby.unregister(&name);
    assert!(lobby.is_empty());

    let mut server = GameRegistry::new();
    server.register(pending).unwrap();
    let hosted = server.require(&name).unwrap();
    assert_eq!(hosted.time_handed_off(), Some(1_000));
    assert_eq!(hosted.players().len(), 2);
    assert!(!hosted.is_started());
}

#[test]
fn test_game_json_roundtrip_preserves_lock_and_players() {
    let mut game = lobby_game();
    game.mark_handed_off(10).unwrap();
    game.lock_input(&Username::new("Bob")).unwrap();

    let json = serde_json::to_string(&game).unwrap();
    let restored: Game = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, game);
    assert!(matches!(
        restored.ensure_accepting_input(),
        Err(GameError::InputLocked(_))
    ));
}

// =========================================================================
// Server-side lifecycle
// =========================================================================

#[test]
fn test_two_players_dropping_locks_need_both_releases() {
    let mut game = lobby_game();
    game.mark_started(5).unwrap();
    game.lock_input(&Username::new("Ada")).unwrap();
    game.lock_input(&Username::new("Bob")).unwrap();

    game.unlock_input(&TaggedUserId::Auth(IdentityProviderId(1)));
    assert!(game.ensure_accepting_input().is_err(), "Bob still holds it");

    game.unlock_input(&TaggedUserId::Guest(GuestUserId::new("guest-bob")));
    assert!(game.ensure_accepting_input().is_ok());
}

#[test]
fn test_last_player_leaving_empties_game() {
    let mut game = lobby_game();
    game.remove_player(&Username::new("Ada")).unwrap();
    assert!(!game.is_empty());
    game.remove_player(&Username::new("Bob")).unwrap();
    assert!(game.is_empty());
    assert!(game.snapshot().players.is_empty());
}
