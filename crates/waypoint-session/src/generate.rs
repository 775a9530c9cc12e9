//! Random identifiers, secrets, and display names.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use rand::seq::IndexedRandom;
use waypoint_protocol::{GuestReconnectionToken, GuestUserId};

const ADJECTIVES: &[&str] = &[
    "Amber", "Brave", "Clever", "Dapper", "Eager", "Fuzzy", "Gentle", "Hasty",
    "Jolly", "Keen", "Lucky", "Mellow", "Nimble", "Quiet", "Rapid", "Sly",
    "Tidy", "Vivid", "Witty", "Zesty",
];

const NOUNS: &[&str] = &[
    "Badger", "Comet", "Falcon", "Fox", "Gecko", "Heron", "Ibis", "Jackal",
    "Kestrel", "Lynx", "Marten", "Newt", "Otter", "Puffin", "Quokka", "Raven",
    "Stoat", "Tapir", "Vole", "Wombat",
];

/// Lowercase hex encoding of `N` random bytes.
pub fn random_hex<const N: usize>() -> String {
    let bytes: [u8; N] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A random two-word name like "Nimble Otter", used for guest display
/// names and for games created without a name.
pub fn random_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Nameless");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("Player");
    format!("{adjective} {noun}")
}

/// A fresh guest user id (128 bits, hex).
pub fn guest_user_id() -> GuestUserId {
    GuestUserId::new(random_hex::<16>())
}

/// A fresh single-use guest reconnection token: 256 random bits,
/// URL-safe base64 so it can ride in a query string untouched.
pub fn guest_reconnection_token() -> GuestReconnectionToken {
    let bytes: [u8; 32] = rand::rng().random();
    GuestReconnectionToken::new(URL_SAFE_NO_PAD.encode(bytes))
}
