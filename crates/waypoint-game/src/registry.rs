//! Per-tier index of live games.

use std::collections::HashMap;

use waypoint_protocol::GameName;

use crate::{Game, GameError};

/// All games a tier is hosting, keyed by name.
///
/// Names are unique within one registry. Each tier owns its own; a game
/// moves from the Lobby's registry to a Game Server's through a pending
/// setup record, never by sharing.
#[derive(Debug, Default)]
pub struct GameRegistry {
    games: HashMap<GameName, Game>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// [`GameError::AlreadyExists`] if the name is taken.
    pub fn register(&mut self, game: Game) -> Result<(), GameError> {
        if self.games.contains_key(game.name()) {
            return Err(GameError::AlreadyExists(game.name().clone()));
        }
        tracing::debug!(game = %game.name(), id = %game.id(), "game registered");
        self.games.insert(game.name().clone(), game);
        Ok(())
    }

    /// Removes a game. Returns `None` if it was not registered.
    pub fn unregister(&mut self, name: &GameName) -> Option<Game> {
        let removed = self.games.remove(name);
        if removed.is_some() {
            tracing::debug!(game = %name, "game unregistered");
        }
        removed
    }

    pub fn get(&self, name: &GameName) -> Option<&Game> {
        self.games.get(name)
    }

    pub fn get_mut(&mut self, name: &GameName) -> Option<&mut Game> {
        self.games.get_mut(name)
    }

    /// # Errors
    /// [`GameError::NotFound`] if no such game is registered.
    pub fn require(&self, name: &GameName) -> Result<&Game, GameError> {
        self.get(name)
            .ok_or_else(|| GameError::NotFound(name.clone()))
    }

    /// # Errors
    /// [`GameError::NotFound`] if no such game is registered.
    pub fn require_mut(&mut self, name: &GameName) -> Result<&mut Game, GameError> {
        self.games
            .get_mut(name)
            .ok_or_else(|| GameError::NotFound(name.clone()))
    }

    pub fn contains(&self, name: &GameName) -> bool {
        self.games.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &GameName> {
        self.games.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use waypoint_protocol::GameId;

    use super::*;

    fn game(name: &str) -> Game {
        Game::new(GameId::new(format!("id-{name}")), GameName::new(name))
    }

    #[test]
    fn test_register_duplicate_name_fails() {
        let mut registry = GameRegistry::new();
        registry.register(game("Quiet Fox")).unwrap();

        let result = registry.register(game("Quiet Fox"));
        assert!(matches!(result, Err(GameError::AlreadyExists(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_require_unknown_game_fails() {
        let registry = GameRegistry::new();
        let err = registry.require(&GameName::new("nope")).unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
        assert_eq!(err.to_string(), "Game not found");
    }

    #[test]
    fn test_unregister_frees_the_name() {
        let mut registry = GameRegistry::new();
        registry.register(game("Quiet Fox")).unwrap();

        assert!(registry.unregister(&GameName::new("Quiet Fox")).is_some());
        assert!(registry.is_empty());
        assert!(registry.unregister(&GameName::new("Quiet Fox")).is_none());
        registry.register(game("Quiet Fox")).unwrap();
    }
}
