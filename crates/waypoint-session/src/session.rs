//! The per-connection user session.
//!
//! A session is the server's record of one live socket: WHO is on the
//! other end (tagged user id and display name), WHERE they are (current
//! game, subscribed channels), and HOW they can be recognised after a
//! disconnect (their reconnection key).
//!
//! One person may hold several sessions at once (multiple browser tabs),
//! each bound to its own [`ConnectionId`].

use std::collections::HashSet;

use waypoint_protocol::{
    ChannelName, ConnectionId, GameName, GuestReconnectionToken,
    ReconnectionKey, TaggedUserId, Username,
};

use crate::SessionError;

/// A single connection's session, owned by the
/// [`UserSessionRegistry`](crate::UserSessionRegistry).
#[derive(Debug, Clone)]
pub struct UserSession {
    connection_id: ConnectionId,
    username: Username,
    tagged_user_id: TaggedUserId,
    current_game_name: Option<GameName>,
    guest_reconnection_token: Option<GuestReconnectionToken>,
    channels: HashSet<ChannelName>,
}

impl UserSession {
    /// Creates a session bound to `connection_id`, in no game and
    /// subscribed to nothing.
    pub fn new(
        connection_id: ConnectionId,
        username: Username,
        tagged_user_id: TaggedUserId,
    ) -> Self {
        Self {
            connection_id,
            username,
            tagged_user_id,
            current_game_name: None,
            guest_reconnection_token: None,
            channels: HashSet::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    /// Replaces the display name. Used when a reconnection restores the
    /// name the player record was created under.
    pub fn set_username(&mut self, username: Username) {
        self.username = username;
    }

    pub fn tagged_user_id(&self) -> &TaggedUserId {
        &self.tagged_user_id
    }

    pub fn is_guest(&self) -> bool {
        self.tagged_user_id.is_guest()
    }

    // -- Current game -----------------------------------------------------

    pub fn current_game_name(&self) -> Option<&GameName> {
        self.current_game_name.as_ref()
    }

    /// Returns the current game or [`SessionError::NotInGame`].
    pub fn require_current_game(&self) -> Result<&GameName, SessionError> {
        self.current_game_name.as_ref().ok_or(SessionError::NotInGame)
    }

    /// Fails with [`SessionError::AlreadyInGame`] if the session is
    /// already in a game. Checked before any join or create.
    pub fn ensure_can_join_game(&self) -> Result<(), SessionError> {
        match self.current_game_name {
            Some(_) => Err(SessionError::AlreadyInGame),
            None => Ok(()),
        }
    }

    pub fn set_current_game(&mut self, game_name: GameName) {
        self.current_game_name = Some(game_name);
    }

    /// Leaves the current game, returning its name if there was one.
    pub fn clear_current_game(&mut self) -> Option<GameName> {
        self.current_game_name.take()
    }

    // -- Reconnection -----------------------------------------------------

    pub fn guest_reconnection_token(&self) -> Option<&GuestReconnectionToken> {
        self.guest_reconnection_token.as_ref()
    }

    /// Caches a guest reconnection token on the session and returns the
    /// one it replaces, if any.
    ///
    /// # Errors
    /// [`SessionError::NotAGuest`] for authenticated sessions, which are
    /// keyed by user id and never hold a guest token.
    pub fn set_guest_reconnection_token(
        &mut self,
        token: GuestReconnectionToken,
    ) -> Result<Option<GuestReconnectionToken>, SessionError> {
        if !self.is_guest() {
            return Err(SessionError::NotAGuest(self.connection_id));
        }
        Ok(self.guest_reconnection_token.replace(token))
    }

    /// The key reconnection records for this user are stored under.
    ///
    /// Authenticated users always have one. Guests only have one once a
    /// reconnection token has been cached on the session.
    pub fn reconnection_key(&self) -> Option<ReconnectionKey> {
        match &self.tagged_user_id {
            TaggedUserId::Auth(id) => Some(ReconnectionKey::Auth(*id)),
            TaggedUserId::Guest(_) => self
                .guest_reconnection_token
                .clone()
                .map(ReconnectionKey::Guest),
        }
    }

    // -- Channels ---------------------------------------------------------

    /// Subscribes to a channel.
    ///
    /// # Errors
    /// [`SessionError::AlreadySubscribed`] if already subscribed.
    pub fn subscribe(&mut self, channel: ChannelName) -> Result<(), SessionError> {
        if self.channels.contains(&channel) {
            return Err(SessionError::AlreadySubscribed {
                connection_id: self.connection_id,
                channel,
            });
        }
        self.channels.insert(channel);
        Ok(())
    }

    /// Unsubscribes from a channel.
    ///
    /// # Errors
    /// [`SessionError::NotSubscribed`] if not subscribed.
    pub fn unsubscribe(&mut self, channel: &ChannelName) -> Result<(), SessionError> {
        if !self.channels.remove(channel) {
            return Err(SessionError::NotSubscribed {
                connection_id: self.connection_id,
                channel: channel.clone(),
            });
        }
        Ok(())
    }

    pub fn is_subscribed(&self, channel: &ChannelName) -> bool {
        self.channels.contains(channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelName> {
        self.channels.iter()
    }
}

#[cfg(test)]
mod tests {
    use waypoint_protocol::{GuestUserId, IdentityProviderId};

    use super::*;

    fn guest(id: u64) -> UserSession {
        UserSession::new(
            ConnectionId::new(id),
            Username::new("Guest"),
            TaggedUserId::Guest(GuestUserId::new(format!("g{id}"))),
        )
    }

    fn auth(id: u64) -> UserSession {
        UserSession::new(
            ConnectionId::new(id),
            Username::new("Member"),
            TaggedUserId::Auth(IdentityProviderId(id)),
        )
    }

    // =====================================================================
    // reconnection_key()
    // =====================================================================

    #[test]
    fn test_reconnection_key_auth_uses_user_id() {
        let session = auth(5);
        assert_eq!(
            session.reconnection_key(),
            Some(ReconnectionKey::Auth(IdentityProviderId(5)))
        );
    }

    #[test]
    fn test_reconnection_key_guest_without_token_is_none() {
        let session = guest(1);
        assert_eq!(session.reconnection_key(), None);
    }

    #[test]
    fn test_reconnection_key_guest_uses_cached_token() {
        let mut session = guest(1);
        session
            .set_guest_reconnection_token(GuestReconnectionToken::new("t1"))
            .unwrap();
        assert_eq!(
            session.reconnection_key(),
            Some(ReconnectionKey::Guest(GuestReconnectionToken::new("t1")))
        );
    }

    // =====================================================================
    // set_guest_reconnection_token()
    // =====================================================================

    #[test]
    fn test_set_guest_reconnection_token_returns_superseded_token() {
        let mut session = guest(1);
        let first = session
            .set_guest_reconnection_token(GuestReconnectionToken::new("old"))
            .unwrap();
        assert!(first.is_none());

        let second = session
            .set_guest_reconnection_token(GuestReconnectionToken::new("new"))
            .unwrap();
        assert_eq!(second, Some(GuestReconnectionToken::new("old")));
    }

    #[test]
    fn test_set_guest_reconnection_token_on_auth_session_fails() {
        let mut session = auth(2);
        let result = session.set_guest_reconnection_token(GuestReconnectionToken::new("x"));
        assert!(matches!(result, Err(SessionError::NotAGuest(_))));
    }

    // =====================================================================
    // current game
    // =====================================================================

    #[test]
    fn test_ensure_can_join_game_rejects_when_in_game() {
        let mut session = guest(1);
        assert!(session.ensure_can_join_game().is_ok());

        session.set_current_game(GameName::new("Lucky Fox"));
        assert!(matches!(
            session.ensure_can_join_game(),
            Err(SessionError::AlreadyInGame)
        ));
    }

    #[test]
    fn test_require_current_game_when_not_in_game_fails() {
        let mut session = guest(1);
        assert!(matches!(
            session.require_current_game(),
            Err(SessionError::NotInGame)
        ));

        session.set_current_game(GameName::new("Lucky Fox"));
        assert_eq!(session.clear_current_game(), Some(GameName::new("Lucky Fox")));
        assert!(session.current_game_name().is_none());
    }

    // =====================================================================
    // subscribe() / unsubscribe()
    // =====================================================================

    #[test]
    fn test_subscribe_twice_is_an_error() {
        let mut session = guest(1);
        session.subscribe(ChannelName::lobby()).unwrap();
        let result = session.subscribe(ChannelName::lobby());
        assert!(matches!(result, Err(SessionError::AlreadySubscribed { .. })));
    }

    #[test]
    fn test_unsubscribe_unknown_channel_is_an_error() {
        let mut session = guest(1);
        let result = session.unsubscribe(&ChannelName::lobby());
        assert!(matches!(result, Err(SessionError::NotSubscribed { .. })));
    }

    #[test]
    fn test_unsubscribe_after_subscribe_clears_channel() {
        let mut session = guest(1);
        session.subscribe(ChannelName::lobby()).unwrap();
        assert!(session.is_subscribed(&ChannelName::lobby()));

        session.unsubscribe(&ChannelName::lobby()).unwrap();
        assert!(!session.is_subscribed(&ChannelName::lobby()));
        assert_eq!(session.channels().count(), 0);
    }
}
