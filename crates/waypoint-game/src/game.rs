//! The game record shared by both tiers.

use serde::{Deserialize, Serialize};
use waypoint_protocol::{
    ChannelName, GameId, GameName, GameSnapshot, TaggedUserId, UnixMillis, Username,
};

use crate::{GameError, InputLock, Player, PlayerRegistry};

/// A game and its lifecycle timestamps.
///
/// The same type lives in the Lobby's registry, in the pending setup
/// record that carries it across the hand-off, and in the Game Server's
/// registry. `Clone` produces an independent deep copy, which is what
/// the hand-off persists; later edits to the Lobby copy never reach the
/// Game Server.
///
/// # Invariants
///
/// - Once `time_handed_off` or `time_started` is set it never changes.
/// - Every holder of the input lock is the tagged id of a current
///   player. Removing a player drops their hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    id: GameId,
    name: GameName,
    players: PlayerRegistry,
    time_started: Option<UnixMillis>,
    time_handed_off: Option<UnixMillis>,
    input_lock: InputLock,
}

impl Game {
    pub fn new(id: GameId, name: GameName) -> Self {
        Self {
            id,
            name,
            players: PlayerRegistry::new(),
            time_started: None,
            time_handed_off: None,
            input_lock: InputLock::new(),
        }
    }

    pub fn id(&self) -> &GameId {
        &self.id
    }

    pub fn name(&self) -> &GameName {
        &self.name
    }

    /// The broadcast channel for this game's members.
    pub fn channel(&self) -> ChannelName {
        ChannelName::game(&self.name)
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    /// Seats a new, not-ready player.
    ///
    /// # Errors
    /// [`GameError::PlayerAlreadyInGame`] if the username is taken.
    pub fn add_player(
        &mut self,
        username: Username,
        tagged_user_id: TaggedUserId,
    ) -> Result<(), GameError> {
        self.players.add(Player::new(username, tagged_user_id))
    }

    /// Removes a player along with any input lock hold they had.
    ///
    /// # Errors
    /// [`GameError::PlayerNotFound`] if no such player exists.
    pub fn remove_player(&mut self, username: &Username) -> Result<Player, GameError> {
        let player = self.players.remove(username)?;
        self.input_lock.remove(player.tagged_user_id());
        Ok(player)
    }

    /// # Errors
    /// [`GameError::PlayerNotFound`] if no such player exists.
    pub fn require_player(&self, username: &Username) -> Result<&Player, GameError> {
        self.players.require(username)
    }

    /// Flips a player's ready flag and returns the new value.
    ///
    /// # Errors
    /// - [`GameError::PlayerNotFound`] if no such player exists.
    /// - [`GameError::AlreadyHandedOff`] once the game has left the Lobby.
    pub fn toggle_ready(&mut self, username: &Username) -> Result<bool, GameError> {
        self.ensure_not_handed_off()?;
        Ok(self.players.require_mut(username)?.toggle_ready())
    }

    pub fn all_players_ready(&self) -> bool {
        self.players.all_ready()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn time_started(&self) -> Option<UnixMillis> {
        self.time_started
    }

    pub fn is_started(&self) -> bool {
        self.time_started.is_some()
    }

    /// Sets the start time.
    ///
    /// # Errors
    /// [`GameError::AlreadyStarted`] if it was already set.
    pub fn mark_started(&mut self, now: UnixMillis) -> Result<UnixMillis, GameError> {
        if self.time_started.is_some() {
            return Err(GameError::AlreadyStarted(self.name.clone()));
        }
        self.time_started = Some(now);
        Ok(now)
    }

    /// # Errors
    /// [`GameError::NotStarted`] if the game has not started.
    pub fn require_started(&self) -> Result<UnixMillis, GameError> {
        self.time_started
            .ok_or_else(|| GameError::NotStarted(self.name.clone()))
    }

    pub fn time_handed_off(&self) -> Option<UnixMillis> {
        self.time_handed_off
    }

    pub fn is_handed_off(&self) -> bool {
        self.time_handed_off.is_some()
    }

    /// Sets the hand-off time.
    ///
    /// # Errors
    /// [`GameError::AlreadyHandedOff`] if it was already set.
    pub fn mark_handed_off(&mut self, now: UnixMillis) -> Result<(), GameError> {
        self.ensure_not_handed_off()?;
        self.time_handed_off = Some(now);
        Ok(())
    }

    /// # Errors
    /// [`GameError::AlreadyHandedOff`] if the hand-off time is set.
    pub fn ensure_not_handed_off(&self) -> Result<(), GameError> {
        if self.time_handed_off.is_some() {
            return Err(GameError::AlreadyHandedOff(self.name.clone()));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Input lock
    // -----------------------------------------------------------------------

    pub fn input_lock(&self) -> &InputLock {
        &self.input_lock
    }

    /// Pauses gameplay input on behalf of a member.
    ///
    /// # Errors
    /// [`GameError::PlayerNotFound`] if `username` is not a player. The
    /// hold is taken under that player's tagged id.
    pub fn lock_input(&mut self, username: &Username) -> Result<(), GameError> {
        let holder = self.players.require(username)?.tagged_user_id().clone();
        self.input_lock.add(holder);
        Ok(())
    }

    /// Releases a member's hold. A no-op if they held none.
    pub fn unlock_input(&mut self, tagged_user_id: &TaggedUserId) {
        self.input_lock.remove(tagged_user_id);
    }

    /// # Errors
    /// [`GameError::InputLocked`] while any member holds the lock.
    pub fn ensure_accepting_input(&self) -> Result<(), GameError> {
        if self.input_lock.is_locked() {
            return Err(GameError::InputLocked(self.name.clone()));
        }
        Ok(())
    }

    /// Client-facing view of the game.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            players: self.players.snapshot(),
            time_started: self.time_started,
            time_handed_off: self.time_handed_off,
            input_locked: self.input_lock.is_locked(),
        }
    }
}

#[cfg(test)]
mod tests {
    use waypoint_protocol::IdentityProviderId;

    use super::*;

    fn auth(id: u64) -> TaggedUserId {
        TaggedUserId::Auth(IdentityProviderId(id))
    }

    fn game_with(names: &[&str]) -> Game {
        let mut game = Game::new(GameId::new("g-1"), GameName::new("Quiet Fox"));
        for (i, name) in names.iter().enumerate() {
            game.add_player(Username::new(*name), auth(i as u64)).unwrap();
        }
        game
    }

    #[test]
    fn test_channel_uses_game_name() {
        let game = game_with(&[]);
        assert_eq!(game.channel().as_str(), "game:Quiet Fox");
    }

    #[test]
    fn test_mark_started_twice_fails() {
        let mut game = game_with(&["Ada"]);
        assert_eq!(game.mark_started(100).unwrap(), 100);

        assert!(matches!(game.mark_started(200), Err(GameError::AlreadyStarted(_))));
        assert_eq!(game.time_started(), Some(100), "start time never changes");
    }

    #[test]
    fn test_require_started_before_start_fails() {
        let game = game_with(&["Ada"]);
        assert!(matches!(game.require_started(), Err(GameError::NotStarted(_))));
    }

    #[test]
    fn test_mark_handed_off_twice_fails() {
        let mut game = game_with(&["Ada"]);
        game.mark_handed_off(50).unwrap();

        assert!(matches!(game.mark_handed_off(60), Err(GameError::AlreadyHandedOff(_))));
        assert_eq!(game.time_handed_off(), Some(50));
    }

    #[test]
    fn test_toggle_ready_after_handoff_fails() {
        let mut game = game_with(&["Ada"]);
        game.mark_handed_off(50).unwrap();

        let result = game.toggle_ready(&Username::new("Ada"));
        assert!(matches!(result, Err(GameError::AlreadyHandedOff(_))));
    }

    #[test]
    fn test_toggle_ready_flips_flag() {
        let mut game = game_with(&["Ada"]);
        assert!(game.toggle_ready(&Username::new("Ada")).unwrap());
        assert!(game.all_players_ready());
        assert!(!game.toggle_ready(&Username::new("Ada")).unwrap());
        assert!(!game.all_players_ready());
    }

    #[test]
    fn test_lock_input_blocks_until_released() {
        let mut game = game_with(&["Ada", "Bob"]);
        game.lock_input(&Username::new("Ada")).unwrap();

        assert!(matches!(
            game.ensure_accepting_input(),
            Err(GameError::InputLocked(_))
        ));
        assert!(game.snapshot().input_locked);

        game.unlock_input(&auth(0));
        assert!(game.ensure_accepting_input().is_ok());
    }

    #[test]
    fn test_lock_input_for_non_player_fails() {
        let mut game = game_with(&["Ada"]);
        let result = game.lock_input(&Username::new("ghost"));
        assert!(matches!(result, Err(GameError::PlayerNotFound(_))));
        assert!(!game.input_lock().is_locked());
    }

    #[test]
    fn test_remove_player_drops_their_input_hold() {
        let mut game = game_with(&["Ada", "Bob"]);
        game.lock_input(&Username::new("Ada")).unwrap();

        game.remove_player(&Username::new("Ada")).unwrap();
        assert!(!game.input_lock().is_locked());
    }

    #[test]
    fn test_clone_is_independent_copy() {
        let original = game_with(&["Ada"]);
        let mut copy = original.clone();
        copy.add_player(Username::new("Bob"), auth(9)).unwrap();
        copy.mark_started(1).unwrap();

        assert_eq!(original.players().len(), 1);
        assert!(!original.is_started());
    }
}
