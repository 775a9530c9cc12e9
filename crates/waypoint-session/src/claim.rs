//! Session claim tokens: the credential that carries a client from the
//! Lobby to a Game Server.
//!
//! The Lobby and every Game Server share one symmetric secret. The Lobby
//! mints a [`GameServerSessionClaimToken`] naming the game, the user, and
//! a random nonce, then encrypts it with AES-256-GCM. The Game Server
//! decrypts it, and because GCM authenticates the ciphertext, a token
//! that decrypts at all was minted by someone holding the secret.
//!
//! Wire format: `base64url(nonce (12 bytes) || ciphertext (includes tag))`.
//!
//! The codec only proves authenticity. Freshness (expiry) and single use
//! (the nonce ledger) are checked by the Game Server on admission.

use std::fmt;
use std::time::Duration;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::Rng;
use serde::{Deserialize, Serialize};
use waypoint_protocol::{
    GameName, GuestReconnectionToken, TaggedUserId, UnixMillis, Username,
    unix_millis,
};

use crate::SessionError;
use crate::generate::random_hex;

/// How long a freshly minted claim token stays valid.
pub const CLAIM_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Length of the AES-GCM nonce prefixed to every encoded token.
const AEAD_NONCE_LEN: usize = 12;

// ---------------------------------------------------------------------------
// GameServerSessionClaimToken
// ---------------------------------------------------------------------------

/// A short-lived, single-use authorization to join one game on a Game
/// Server.
///
/// Fields are private and fixed at construction; the expiration is
/// computed once from the wall clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameServerSessionClaimToken {
    game_name: GameName,
    username: Username,
    tagged_user_id: TaggedUserId,
    guest_reconnection_token: Option<GuestReconnectionToken>,
    /// 16 random bytes, hex. Distinct for every token minted.
    nonce: String,
    expiration_timestamp: UnixMillis,
}

impl GameServerSessionClaimToken {
    /// Mints a token valid for [`CLAIM_TOKEN_TTL`].
    pub fn new(
        game_name: GameName,
        username: Username,
        tagged_user_id: TaggedUserId,
        guest_reconnection_token: Option<GuestReconnectionToken>,
    ) -> Self {
        Self::with_ttl(
            game_name,
            username,
            tagged_user_id,
            guest_reconnection_token,
            CLAIM_TOKEN_TTL,
        )
    }

    /// Mints a token valid for `ttl` from now.
    pub fn with_ttl(
        game_name: GameName,
        username: Username,
        tagged_user_id: TaggedUserId,
        guest_reconnection_token: Option<GuestReconnectionToken>,
        ttl: Duration,
    ) -> Self {
        Self {
            game_name,
            username,
            tagged_user_id,
            guest_reconnection_token,
            nonce: random_hex::<16>(),
            expiration_timestamp: unix_millis() + ttl.as_millis() as UnixMillis,
        }
    }

    pub fn game_name(&self) -> &GameName {
        &self.game_name
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn tagged_user_id(&self) -> &TaggedUserId {
        &self.tagged_user_id
    }

    pub fn guest_reconnection_token(&self) -> Option<&GuestReconnectionToken> {
        self.guest_reconnection_token.as_ref()
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn expiration_timestamp(&self) -> UnixMillis {
        self.expiration_timestamp
    }

    /// `true` once `now` is strictly past the expiration timestamp.
    pub fn is_expired_at(&self, now: UnixMillis) -> bool {
        now > self.expiration_timestamp
    }
}

// ---------------------------------------------------------------------------
// ClaimTokenSecret
// ---------------------------------------------------------------------------

/// The 256-bit key shared by the Lobby and every Game Server.
#[derive(Clone, PartialEq, Eq)]
pub struct ClaimTokenSecret([u8; 32]);

impl ClaimTokenSecret {
    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generates a random secret. Only useful when both tiers run in the
    /// same process, or for tests.
    pub fn generate() -> Self {
        Self(rand::rng().random())
    }

    /// Parses a standard (padded) base64 encoding of exactly 32 bytes,
    /// e.g. the output of `openssl rand -base64 32`.
    ///
    /// # Errors
    /// [`SessionError::InvalidSecret`] on bad base64 or the wrong length.
    pub fn from_base64(encoded: &str) -> Result<Self, SessionError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SessionError::InvalidSecret(e.to_string()))?;
        let key: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            SessionError::InvalidSecret(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(key))
    }

    /// Standard base64 encoding, the inverse of [`from_base64`](Self::from_base64).
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl fmt::Debug for ClaimTokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClaimTokenSecret(..)")
    }
}

// ---------------------------------------------------------------------------
// ClaimTokenCodec
// ---------------------------------------------------------------------------

/// Encrypts and decrypts [`GameServerSessionClaimToken`]s.
pub struct ClaimTokenCodec {
    cipher: Aes256Gcm,
}

impl ClaimTokenCodec {
    pub fn new(secret: &ClaimTokenSecret) -> Self {
        let key = Key::<Aes256Gcm>::from(secret.0);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Serializes and encrypts a token into an opaque, URL-safe string.
    ///
    /// Every call uses a fresh random AEAD nonce, so encoding the same
    /// token twice yields different strings.
    pub fn encode(&self, token: &GameServerSessionClaimToken) -> Result<String, SessionError> {
        let plaintext = serde_json::to_vec(token)
            .map_err(|e| SessionError::ClaimTokenEncode(e.to_string()))?;

        let nonce_bytes: [u8; AEAD_NONCE_LEN] = rand::rng().random();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|e| SessionError::ClaimTokenEncode(e.to_string()))?;

        let mut framed = Vec::with_capacity(AEAD_NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce_bytes);
        framed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(framed))
    }

    /// Decrypts and deserializes a token.
    ///
    /// # Errors
    /// [`SessionError::ClaimTokenDecode`] for anything that is not a token
    /// this secret produced: bad base64, truncation, a failed
    /// authentication tag, or a plaintext that isn't a token.
    pub fn decode(&self, encoded: &str) -> Result<GameServerSessionClaimToken, SessionError> {
        let framed = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| SessionError::ClaimTokenDecode(e.to_string()))?;
        if framed.len() <= AEAD_NONCE_LEN {
            return Err(SessionError::ClaimTokenDecode("token too short".into()));
        }

        let (nonce_bytes, ciphertext) = framed.split_at(AEAD_NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| SessionError::ClaimTokenDecode("authentication failed".into()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| SessionError::ClaimTokenDecode(e.to_string()))
    }
}
