//! User sessions and message addressing for Waypoint.
//!
//! This crate holds everything that is about a *connection* rather than
//! a game:
//!
//! 1. **Sessions**: who is on each socket ([`UserSession`],
//!    [`UserSessionRegistry`])
//! 2. **Addressing**: building per-handler outboxes of single and
//!    channel fan-out dispatches ([`Outbox`], [`MessageDispatch`])
//! 3. **Identity**: turning handshake credentials into users
//!    ([`IdentityProvider`])
//! 4. **Hand-off trust**: encrypted, single-use claim tokens
//!    ([`ClaimTokenCodec`], [`NonceLedger`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Tiers (Lobby / Game Server)  ← build outboxes, admit connections
//!     ↕
//! Session Layer (this crate)   ← sessions, channels, claim tokens
//!     ↕
//! Protocol Layer (below)       ← identity newtypes, message catalogs
//! ```

#![allow(async_fn_in_trait)]

mod claim;
mod dispatch;
mod error;
mod generate;
mod identity;
mod ledger;
mod registry;
mod session;

pub use claim::{
    CLAIM_TOKEN_TTL, ClaimTokenCodec, ClaimTokenSecret, GameServerSessionClaimToken,
};
pub use dispatch::{FanOutOptions, MessageDispatch, Outbox};
pub use error::SessionError;
pub use generate::{guest_reconnection_token, guest_user_id, random_hex, random_name};
pub use identity::{IdentityProvider, InMemoryIdentityProvider, ResolvedIdentity};
pub use ledger::NonceLedger;
pub use registry::UserSessionRegistry;
pub use session::UserSession;
