//! Identity and naming types shared by every Waypoint crate.
//!
//! Almost everything in the system is addressed by some kind of string:
//! usernames, game names, channel names, guest tokens. Each gets its own
//! newtype so a `GameName` can never be passed where a `Username` is
//! expected, even though both are `String` underneath.
//!
//! All of them serialize transparently, so `Username("Ada".into())` is
//! just `"Ada"` on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declares a transparent `String` newtype with the usual conversions.
macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the underlying `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_newtype!(
    /// A player's display name. Mutable per session: a guest may come
    /// back under a different generated name, and reconnection restores
    /// the one their player record was created with.
    Username
);

string_newtype!(
    /// The human-readable, immutable name of a game. Games are keyed by
    /// name in every registry and store.
    GameName
);

string_newtype!(
    /// Unique id assigned to a game when it is created in the Lobby.
    GameId
);

string_newtype!(
    /// Name of a fan-out channel that connections subscribe to.
    ChannelName
);

string_newtype!(
    /// Logical name of a Game Server process, recorded so the Lobby can
    /// route a reconnecting player back to the right host.
    GameServerName
);

string_newtype!(
    /// Randomly generated id of a guest user.
    GuestUserId
);

string_newtype!(
    /// Single-use secret a guest client caches so it can be recognised
    /// again after a disconnect.
    GuestReconnectionToken
);

impl ChannelName {
    /// Channel every non-forwarded Lobby connection joins.
    pub fn lobby() -> Self {
        Self::new("lobby")
    }

    /// Channel carrying all traffic for one game.
    pub fn game(name: &GameName) -> Self {
        Self(format!("game:{name}"))
    }
}

/// Stable numeric id of an authenticated user, issued by the identity
/// provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityProviderId(pub u64);

impl fmt::Display for IdentityProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TaggedUserId
// ---------------------------------------------------------------------------

/// Identifies a person independently of any connection.
///
/// Authenticated users carry the provider's id; guests carry a random
/// id that only lives as long as their client remembers it.
///
/// `#[serde(tag = "type", content = "id")]` produces
/// `{ "type": "Auth", "id": 42 }` / `{ "type": "Guest", "id": "9f..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum TaggedUserId {
    /// A user the identity provider knows.
    Auth(IdentityProviderId),
    /// An anonymous guest.
    Guest(GuestUserId),
}

impl TaggedUserId {
    /// Returns `true` for guest identities.
    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

impl fmt::Display for TaggedUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(id) => write!(f, "auth:{id}"),
            Self::Guest(id) => write!(f, "guest:{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ReconnectionKey
// ---------------------------------------------------------------------------

/// Lookup handle for everything reconnection-related.
///
/// Authenticated users are keyed by their stable id. Guests have no
/// stable id worth trusting, so they are keyed by the single-use token
/// the server last handed them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "key")]
pub enum ReconnectionKey {
    /// Keyed by the authenticated user's id.
    Auth(IdentityProviderId),
    /// Keyed by the guest's current reconnection token.
    Guest(GuestReconnectionToken),
}

impl fmt::Display for ReconnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(id) => write!(f, "auth:{id}"),
            // Never log a live guest secret in full.
            Self::Guest(token) => {
                let prefix: String = token.as_str().chars().take(6).collect();
                write!(f, "guest:{prefix}…")
            }
        }
    }
}
