//! Games for Waypoint.
//!
//! A [`Game`] is plain data: a name, an id, a [`PlayerRegistry`], two
//! one-shot lifecycle timestamps, and an [`InputLock`]. It has no tasks
//! and no sockets. Both tiers keep their games in a [`GameRegistry`]
//! behind the tier's state lock and broadcast changes through the
//! session layer's outboxes.
//!
//! # Lifecycle
//!
//! ```text
//! Lobby:        created → players join / toggle ready → handed off
//!                                                         │ (deep copy)
//! Game Server:  loaded from pending setup → started → empty → unregistered
//! ```

mod error;
mod game;
mod lock;
mod players;
mod registry;

pub use error::GameError;
pub use game::Game;
pub use lock::{InputLock, ReferenceCountedLock};
pub use players::{Player, PlayerRegistry};
pub use registry::GameRegistry;
