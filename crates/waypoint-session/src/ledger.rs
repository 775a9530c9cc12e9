//! Replay protection for session claim tokens.

use std::collections::HashMap;

use waypoint_protocol::UnixMillis;

use crate::SessionError;

/// Process-wide record of consumed claim token nonces.
///
/// Each entry lives until its token's expiration; after that the token
/// is rejected as expired anyway, so the nonce no longer needs tracking.
/// Growth is therefore bounded by the token TTL and the admission rate.
#[derive(Debug, Default)]
pub struct NonceLedger {
    consumed: HashMap<String, UnixMillis>,
}

impl NonceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `nonce` as consumed, or fails if it already was.
    ///
    /// Entries whose expiration is before `now` are purged first.
    ///
    /// # Errors
    /// [`SessionError::ReplayedNonce`] if the nonce was consumed within
    /// its token's lifetime.
    pub fn consume(
        &mut self,
        nonce: &str,
        expiration: UnixMillis,
        now: UnixMillis,
    ) -> Result<(), SessionError> {
        self.consumed.retain(|_, expires| *expires >= now);

        if self.consumed.contains_key(nonce) {
            tracing::warn!(nonce, "claim token replay suspected");
            return Err(SessionError::ReplayedNonce);
        }
        self.consumed.insert(nonce.to_owned(), expiration);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.consumed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_same_nonce_twice_is_replay() {
        let mut ledger = NonceLedger::new();
        ledger.consume("n1", 2_000, 1_000).expect("first use is fine");

        let result = ledger.consume("n1", 2_000, 1_500);
        assert!(matches!(result, Err(SessionError::ReplayedNonce)));
    }

    #[test]
    fn test_consume_distinct_nonces_both_accepted() {
        let mut ledger = NonceLedger::new();
        ledger.consume("n1", 2_000, 1_000).unwrap();
        ledger.consume("n2", 2_000, 1_000).unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_consume_purges_entries_past_expiration() {
        let mut ledger = NonceLedger::new();
        ledger.consume("old", 1_000, 500).unwrap();
        ledger.consume("fresh", 5_000, 500).unwrap();

        // At t=1_001 "old" is past its expiration and gets collected.
        ledger.consume("new", 6_000, 1_001).unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_consume_keeps_entry_until_exact_expiration() {
        let mut ledger = NonceLedger::new();
        ledger.consume("n1", 1_000, 500).unwrap();
        // now == expiration: still tracked.
        assert!(matches!(
            ledger.consume("n1", 1_000, 1_000),
            Err(SessionError::ReplayedNonce)
        ));
    }
}
