//! Identity resolution hook.
//!
//! Waypoint does not authenticate anyone itself. The Lobby asks an
//! [`IdentityProvider`] to turn the handshake's credentials into a
//! display name and a [`TaggedUserId`]; without credentials, providers
//! fall back to minting a guest.
//!
//! # Why a trait?
//!
//! Production deployments put an OAuth/JWT verifier or an account
//! service behind it, while tests and the demo use
//! [`InMemoryIdentityProvider`].

use std::collections::HashMap;

use tokio::sync::RwLock;
use waypoint_protocol::{HandshakeParams, IdentityProviderId, TaggedUserId, Username};

use crate::SessionError;
use crate::generate::{guest_user_id, random_name};

/// Who a connecting client turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub username: Username,
    pub tagged_user_id: TaggedUserId,
}

impl ResolvedIdentity {
    /// A brand-new guest with a random id and a random display name.
    pub fn new_guest() -> Self {
        Self {
            username: Username::new(random_name()),
            tagged_user_id: TaggedUserId::Guest(guest_user_id()),
        }
    }
}

/// Resolves handshake credentials into an identity.
///
/// `Send + Sync + 'static` because one provider is shared by every
/// connection task for the lifetime of the server.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolves the identity behind a connection attempt.
    ///
    /// # Returns
    /// - `Ok(identity)`: an authenticated user, or a fresh guest when no
    ///   auth token was presented
    /// - `Err(SessionError::AuthFailed)`: an auth token was presented
    ///   but rejected
    fn resolve(
        &self,
        params: &HandshakeParams,
    ) -> impl std::future::Future<Output = Result<ResolvedIdentity, SessionError>> + Send;
}

/// An [`IdentityProvider`] backed by an in-memory table of auth tokens.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    users: RwLock<HashMap<String, (IdentityProviderId, Username)>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `auth_token` resolve to the given authenticated user.
    pub async fn register_authenticated_user(
        &self,
        auth_token: impl Into<String>,
        user_id: IdentityProviderId,
        username: Username,
    ) {
        self.users
            .write()
            .await
            .insert(auth_token.into(), (user_id, username));
    }
}

impl IdentityProvider for InMemoryIdentityProvider {
    async fn resolve(&self, params: &HandshakeParams) -> Result<ResolvedIdentity, SessionError> {
        let Some(token) = params.auth_token.as_deref() else {
            return Ok(ResolvedIdentity::new_guest());
        };

        let users = self.users.read().await;
        let (user_id, username) = users
            .get(token)
            .ok_or_else(|| SessionError::AuthFailed("unknown auth token".into()))?;
        Ok(ResolvedIdentity {
            username: username.clone(),
            tagged_user_id: TaggedUserId::Auth(*user_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_without_token_mints_guest() {
        let provider = InMemoryIdentityProvider::new();
        let a = provider.resolve(&HandshakeParams::default()).await.unwrap();
        let b = provider.resolve(&HandshakeParams::default()).await.unwrap();

        assert!(a.tagged_user_id.is_guest());
        assert_ne!(a.tagged_user_id, b.tagged_user_id, "every guest is new");
        assert!(a.username.as_str().contains(' '));
    }

    #[tokio::test]
    async fn test_resolve_registered_token_returns_auth_user() {
        let provider = InMemoryIdentityProvider::new();
        provider
            .register_authenticated_user("tok-1", IdentityProviderId(42), Username::new("Ada"))
            .await;

        let params = HandshakeParams {
            auth_token: Some("tok-1".into()),
            ..HandshakeParams::default()
        };
        let identity = provider.resolve(&params).await.unwrap();
        assert_eq!(identity.tagged_user_id, TaggedUserId::Auth(IdentityProviderId(42)));
        assert_eq!(identity.username, Username::new("Ada"));
    }

    #[tokio::test]
    async fn test_resolve_unknown_token_fails() {
        let provider = InMemoryIdentityProvider::new();
        let params = HandshakeParams {
            auth_token: Some("forged".into()),
            ..HandshakeParams::default()
        };
        assert!(matches!(
            provider.resolve(&params).await,
            Err(SessionError::AuthFailed(_))
        ));
    }
}
