//! The session registry: every live connection on one tier process.
//!
//! The registry answers the three questions the rest of the server keeps
//! asking:
//! - "which session is on connection X?"
//! - "who is subscribed to channel Y?" (fan-out audiences)
//! - "which connections belong to user Z?" (duplicate-session checks)
//!
//! # Concurrency note
//!
//! Like the game registry, `UserSessionRegistry` is a plain owned value
//! with no internal locking. Each tier keeps it inside its state mutex,
//! so a handler sees a consistent registry for the whole of one message.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use waypoint_protocol::{ChannelName, ConnectionId, GameName, TaggedUserId, Username};

use crate::{SessionError, UserSession};

/// Tracks all registered [`UserSession`]s, keyed by connection.
#[derive(Debug)]
pub struct UserSessionRegistry {
    sessions: HashMap<ConnectionId, UserSession>,

    /// Index from user to that user's live connections.
    ///
    /// Kept in sync with `sessions` by `register`/`unregister`; a user
    /// with no connections has no entry.
    connections_by_user: HashMap<TaggedUserId, HashSet<ConnectionId>>,

    next_connection_id: AtomicU64,
}

impl UserSessionRegistry {
    /// Creates an empty registry. Connection ids start at 1.
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            connections_by_user: HashMap::new(),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Hands out a fresh connection id. Ids are never reused.
    pub fn issue_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a session under its connection id.
    ///
    /// # Errors
    /// [`SessionError::DuplicateSession`] if the connection already has one.
    pub fn register(&mut self, session: UserSession) -> Result<(), SessionError> {
        let connection_id = session.connection_id();
        if self.sessions.contains_key(&connection_id) {
            return Err(SessionError::DuplicateSession(connection_id));
        }

        self.connections_by_user
            .entry(session.tagged_user_id().clone())
            .or_default()
            .insert(connection_id);

        tracing::debug!(
            %connection_id,
            username = %session.username(),
            user = %session.tagged_user_id(),
            "session registered"
        );
        self.sessions.insert(connection_id, session);
        Ok(())
    }

    /// Removes and returns the session for a connection.
    ///
    /// # Errors
    /// [`SessionError::SessionNotFound`] if nothing is registered there.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Result<UserSession, SessionError> {
        let session = self
            .sessions
            .remove(&connection_id)
            .ok_or(SessionError::SessionNotFound(connection_id))?;

        let user = session.tagged_user_id();
        if let Some(connections) = self.connections_by_user.get_mut(user) {
            connections.remove(&connection_id);
            if connections.is_empty() {
                self.connections_by_user.remove(user);
            }
        }

        tracing::debug!(%connection_id, "session unregistered");
        Ok(session)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&UserSession> {
        self.sessions.get(&connection_id)
    }

    /// Looks up a session, failing with [`SessionError::SessionNotFound`].
    pub fn require(&self, connection_id: ConnectionId) -> Result<&UserSession, SessionError> {
        self.sessions
            .get(&connection_id)
            .ok_or(SessionError::SessionNotFound(connection_id))
    }

    /// Mutable variant of [`require`](Self::require).
    pub fn require_mut(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<&mut UserSession, SessionError> {
        self.sessions
            .get_mut(&connection_id)
            .ok_or(SessionError::SessionNotFound(connection_id))
    }

    // -- Channel queries --------------------------------------------------

    /// All connections subscribed to `channel`, minus `excluded`.
    ///
    /// Sorted by connection id so fan-out order is deterministic.
    pub fn in_channel(
        &self,
        channel: &ChannelName,
        excluded: &[ConnectionId],
    ) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .sessions
            .values()
            .filter(|session| session.is_subscribed(channel))
            .map(UserSession::connection_id)
            .filter(|id| !excluded.contains(id))
            .collect();
        ids.sort();
        ids
    }

    // -- User queries -----------------------------------------------------

    /// Every live connection held by one user.
    pub fn connection_ids_for_user(&self, user: &TaggedUserId) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .connections_by_user
            .get(user)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// `true` if the user holds at least one live connection.
    pub fn user_is_already_connected(&self, user: &TaggedUserId) -> bool {
        self.connections_by_user.contains_key(user)
    }

    /// Every session currently displaying `username`.
    pub fn sessions_by_username(&self, username: &Username) -> Vec<&UserSession> {
        let mut sessions: Vec<&UserSession> = self
            .sessions
            .values()
            .filter(|session| session.username() == username)
            .collect();
        sessions.sort_by_key(|session| session.connection_id());
        sessions
    }

    /// The session through which `username` is taking part in `game_name`.
    ///
    /// A player may have other tabs open, but only one of them can be in
    /// a given game, so at most one session matches.
    pub fn expected_session_in_game(
        &self,
        username: &Username,
        game_name: &GameName,
    ) -> Option<&UserSession> {
        self.sessions_by_username(username)
            .into_iter()
            .find(|session| session.current_game_name() == Some(game_name))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for UserSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `UserSessionRegistry`.
    //!
    //! Naming convention: `test_{function}_{scenario}_{expected}`.

    use waypoint_protocol::{GuestUserId, IdentityProviderId};

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn auth_user(id: u64) -> TaggedUserId {
        TaggedUserId::Auth(IdentityProviderId(id))
    }

    /// Registers a session for `user` on connection `id`.
    fn register(registry: &mut UserSessionRegistry, id: u64, name: &str, user: TaggedUserId) {
        registry
            .register(UserSession::new(cid(id), Username::new(name), user))
            .expect("register should succeed");
    }

    // =====================================================================
    // issue_connection_id()
    // =====================================================================

    #[test]
    fn test_issue_connection_id_never_repeats() {
        let registry = UserSessionRegistry::new();
        let a = registry.issue_connection_id();
        let b = registry.issue_connection_id();
        let c = registry.issue_connection_id();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(a < b && b < c, "ids should be issued in increasing order");
    }

    // =====================================================================
    // register() / unregister()
    // =====================================================================

    #[test]
    fn test_register_duplicate_connection_returns_error() {
        let mut registry = UserSessionRegistry::new();
        register(&mut registry, 1, "Ada", auth_user(1));

        let result = registry.register(UserSession::new(
            cid(1),
            Username::new("Bob"),
            auth_user(2),
        ));

        assert!(
            matches!(result, Err(SessionError::DuplicateSession(id)) if id == cid(1)),
            "second registration on the same connection must fail"
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_unknown_connection_returns_error() {
        let mut registry = UserSessionRegistry::new();
        let result = registry.unregister(cid(9));
        assert!(matches!(result, Err(SessionError::SessionNotFound(_))));
    }

    #[test]
    fn test_unregister_last_connection_clears_user_index() {
        let mut registry = UserSessionRegistry::new();
        register(&mut registry, 1, "Ada", auth_user(1));
        assert!(registry.user_is_already_connected(&auth_user(1)));

        let session = registry.unregister(cid(1)).expect("should succeed");
        assert_eq!(session.username().as_str(), "Ada");
        assert!(!registry.user_is_already_connected(&auth_user(1)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_connection_ids_for_user_tracks_multiple_tabs() {
        // Same user, two browser tabs.
        let mut registry = UserSessionRegistry::new();
        register(&mut registry, 1, "Ada", auth_user(1));
        register(&mut registry, 2, "Ada", auth_user(1));
        register(&mut registry, 3, "Bob", auth_user(2));

        assert_eq!(registry.connection_ids_for_user(&auth_user(1)), vec![cid(1), cid(2)]);

        registry.unregister(cid(1)).unwrap();
        assert_eq!(registry.connection_ids_for_user(&auth_user(1)), vec![cid(2)]);
        assert!(registry.user_is_already_connected(&auth_user(1)));
    }

    // =====================================================================
    // in_channel()
    // =====================================================================

    #[test]
    fn test_in_channel_respects_exclusions() {
        let mut registry = UserSessionRegistry::new();
        let channel = ChannelName::game(&GameName::new("Lucky Fox"));
        for id in 1..=3 {
            register(&mut registry, id, &format!("P{id}"), auth_user(id));
            registry.require_mut(cid(id)).unwrap().subscribe(channel.clone()).unwrap();
        }
        register(&mut registry, 4, "Lurker", auth_user(4));

        assert_eq!(registry.in_channel(&channel, &[]), vec![cid(1), cid(2), cid(3)]);
        assert_eq!(registry.in_channel(&channel, &[cid(2)]), vec![cid(1), cid(3)]);
    }

    // =====================================================================
    // expected_session_in_game()
    // =====================================================================

    #[test]
    fn test_expected_session_in_game_ignores_other_tabs() {
        let mut registry = UserSessionRegistry::new();
        let guest = TaggedUserId::Guest(GuestUserId::new("g1"));
        register(&mut registry, 1, "Ada", guest.clone());
        register(&mut registry, 2, "Ada", guest);
        registry
            .require_mut(cid(2))
            .unwrap()
            .set_current_game(GameName::new("Lucky Fox"));

        let found = registry
            .expected_session_in_game(&Username::new("Ada"), &GameName::new("Lucky Fox"))
            .expect("the tab in the game should be found");
        assert_eq!(found.connection_id(), cid(2));

        assert!(registry
            .expected_session_in_game(&Username::new("Ada"), &GameName::new("Other"))
            .is_none());
        assert_eq!(registry.sessions_by_username(&Username::new("Ada")).len(), 2);
    }
}
