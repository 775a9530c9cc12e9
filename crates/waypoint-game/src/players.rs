//! Game membership.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use waypoint_protocol::{PlayerSnapshot, TaggedUserId, Username};

use crate::GameError;

/// A member of a game.
///
/// The tagged user id travels with the record so the Game Server can
/// match a reconnecting user back to their seat even if their display
/// name changed on the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    username: Username,
    tagged_user_id: TaggedUserId,
    ready: bool,
}

impl Player {
    pub fn new(username: Username, tagged_user_id: TaggedUserId) -> Self {
        Self {
            username,
            tagged_user_id,
            ready: false,
        }
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn tagged_user_id(&self) -> &TaggedUserId {
        &self.tagged_user_id
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Flips the ready flag and returns the new value.
    pub fn toggle_ready(&mut self) -> bool {
        self.ready = !self.ready;
        self.ready
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            username: self.username.clone(),
            ready: self.ready,
        }
    }
}

/// Players of one game, keyed by username.
///
/// Ordered so that snapshots list players the same way every time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRegistry {
    players: BTreeMap<Username, Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// [`GameError::PlayerAlreadyInGame`] if the username is taken.
    pub fn add(&mut self, player: Player) -> Result<(), GameError> {
        if self.players.contains_key(player.username()) {
            return Err(GameError::PlayerAlreadyInGame(player.username().clone()));
        }
        self.players.insert(player.username().clone(), player);
        Ok(())
    }

    /// # Errors
    /// [`GameError::PlayerNotFound`] if no such player exists.
    pub fn remove(&mut self, username: &Username) -> Result<Player, GameError> {
        self.players
            .remove(username)
            .ok_or_else(|| GameError::PlayerNotFound(username.clone()))
    }

    pub fn get(&self, username: &Username) -> Option<&Player> {
        self.players.get(username)
    }

    /// # Errors
    /// [`GameError::PlayerNotFound`] if no such player exists.
    pub fn require(&self, username: &Username) -> Result<&Player, GameError> {
        self.get(username)
            .ok_or_else(|| GameError::PlayerNotFound(username.clone()))
    }

    /// # Errors
    /// [`GameError::PlayerNotFound`] if no such player exists.
    pub fn require_mut(&mut self, username: &Username) -> Result<&mut Player, GameError> {
        self.players
            .get_mut(username)
            .ok_or_else(|| GameError::PlayerNotFound(username.clone()))
    }

    pub fn contains(&self, username: &Username) -> bool {
        self.players.contains_key(username)
    }

    /// The player seated under `tagged_user_id`, if any.
    pub fn find_by_user(&self, tagged_user_id: &TaggedUserId) -> Option<&Player> {
        self.players
            .values()
            .find(|p| p.tagged_user_id() == tagged_user_id)
    }

    pub fn usernames(&self) -> impl Iterator<Item = &Username> {
        self.players.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// `true` iff the registry is non-empty and every player is ready.
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(Player::is_ready)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn snapshot(&self) -> Vec<PlayerSnapshot> {
        self.players.values().map(Player::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use waypoint_protocol::IdentityProviderId;

    use super::*;

    fn player(name: &str, id: u64) -> Player {
        Player::new(Username::new(name), TaggedUserId::Auth(IdentityProviderId(id)))
    }

    #[test]
    fn test_add_duplicate_username_fails() {
        let mut players = PlayerRegistry::new();
        players.add(player("Ada", 1)).unwrap();

        let result = players.add(player("Ada", 2));
        assert!(matches!(result, Err(GameError::PlayerAlreadyInGame(_))));
        assert_eq!(players.len(), 1);
    }

    #[test]
    fn test_remove_unknown_player_fails() {
        let mut players = PlayerRegistry::new();
        let result = players.remove(&Username::new("ghost"));
        assert!(matches!(result, Err(GameError::PlayerNotFound(_))));
    }

    #[test]
    fn test_all_ready_empty_registry_is_false() {
        assert!(!PlayerRegistry::new().all_ready());
    }

    #[test]
    fn test_all_ready_requires_every_player() {
        let mut players = PlayerRegistry::new();
        players.add(player("Ada", 1)).unwrap();
        players.add(player("Bob", 2)).unwrap();

        players.require_mut(&Username::new("Ada")).unwrap().toggle_ready();
        assert!(!players.all_ready());

        players.require_mut(&Username::new("Bob")).unwrap().toggle_ready();
        assert!(players.all_ready());
    }

    #[test]
    fn test_find_by_user_matches_tagged_id() {
        let mut players = PlayerRegistry::new();
        players.add(player("Ada", 1)).unwrap();

        let found = players.find_by_user(&TaggedUserId::Auth(IdentityProviderId(1)));
        assert_eq!(found.map(|p| p.username().as_str()), Some("Ada"));
        assert!(players
            .find_by_user(&TaggedUserId::Auth(IdentityProviderId(9)))
            .is_none());
    }

    #[test]
    fn test_snapshot_is_sorted_by_username() {
        let mut players = PlayerRegistry::new();
        players.add(player("Zed", 1)).unwrap();
        players.add(player("Ada", 2)).unwrap();

        let names: Vec<_> = players
            .snapshot()
            .into_iter()
            .map(|p| p.username.into_inner())
            .collect();
        assert_eq!(names, vec!["Ada", "Zed"]);
    }
}
