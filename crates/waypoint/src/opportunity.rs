//! Time-boxed reconnection opportunities.
//!
//! When a player drops out of a hosted game, the Game Server opens a
//! [`ReconnectionOpportunity`] for them. Two things race to close it: the
//! player coming back (`claim`) and the timer running out (`expire`).
//! Exactly one of them wins.
//!
//! ```text
//!            claim() ──► Claimed
//!  Active ──┤
//!            expire() ─► Expired ──► on_expire()
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::AbortHandle;
use waypoint_protocol::{GuestReconnectionToken, IdentityProviderId, ReconnectionKey, Username};

type ExpiryCallback = Box<dyn FnOnce() + Send>;

enum OpportunityState {
    Active {
        timer: Option<AbortHandle>,
        on_expire: ExpiryCallback,
    },
    Claimed,
    Expired,
}

/// A single-use window in which a disconnected player may reclaim a seat.
///
/// The state lives behind a synchronous mutex that is never held across
/// an `.await`, so `claim` and `expire` are atomic with respect to each
/// other even when called from different tasks or threads.
pub struct ReconnectionOpportunity {
    username: Username,
    state: Mutex<OpportunityState>,
}

impl ReconnectionOpportunity {
    /// Opens an opportunity and starts its timer.
    ///
    /// `on_expire` runs at most once, synchronously, on whichever task
    /// calls [`expire`](Self::expire). It must not block; to do async
    /// work it should spawn a task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(
        username: Username,
        duration: Duration,
        on_expire: impl FnOnce() + Send + 'static,
    ) -> Arc<Self> {
        let opportunity = Arc::new(Self {
            username,
            state: Mutex::new(OpportunityState::Active {
                timer: None,
                on_expire: Box::new(on_expire),
            }),
        });

        // The timer holds a weak reference: an opportunity nobody keeps
        // any more has nothing left to expire.
        let weak: Weak<Self> = Arc::downgrade(&opportunity);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(opportunity) = weak.upgrade() {
                opportunity.expire();
            }
        })
        .abort_handle();

        match &mut *opportunity.lock_state() {
            OpportunityState::Active { timer: slot, .. } => *slot = Some(timer),
            _ => timer.abort(),
        }
        opportunity
    }

    /// The name the player was seated under when they dropped.
    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.lock_state(), OpportunityState::Active { .. })
    }

    /// Claims the seat. Returns `true` exactly once per opportunity, and
    /// never after it expired. The timer is cancelled on success and the
    /// expiry callback is dropped without running.
    pub fn claim(&self) -> bool {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, OpportunityState::Claimed) {
            OpportunityState::Active { timer, .. } => {
                if let Some(timer) = timer {
                    timer.abort();
                }
                true
            }
            terminal => {
                *state = terminal;
                false
            }
        }
    }

    /// Closes the window and runs the expiry callback. Returns `false`,
    /// doing nothing, if the opportunity was already claimed or expired.
    pub fn expire(&self) -> bool {
        let on_expire = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, OpportunityState::Expired) {
                OpportunityState::Active { timer, on_expire } => {
                    if let Some(timer) = timer {
                        timer.abort();
                    }
                    on_expire
                }
                terminal => {
                    *state = terminal;
                    return false;
                }
            }
        };
        on_expire();
        true
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, OpportunityState> {
        // The state is always left valid, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ReconnectionOpportunity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectionOpportunity")
            .field("username", &self.username)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Open opportunities on one Game Server, by reconnection key.
///
/// Auth and guest keys live in separate maps; every operation dispatches
/// on the key's variant.
#[derive(Debug, Default)]
pub struct ReconnectionOpportunityManager {
    by_auth: HashMap<IdentityProviderId, Arc<ReconnectionOpportunity>>,
    by_guest: HashMap<GuestReconnectionToken, Arc<ReconnectionOpportunity>>,
}

impl ReconnectionOpportunityManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `opportunity` under `key`.
    ///
    /// A key holds at most one opportunity. One it replaces is claimed
    /// on the spot, which silences its timer.
    pub fn add(&mut self, key: ReconnectionKey, opportunity: Arc<ReconnectionOpportunity>) {
        let replaced = match &key {
            ReconnectionKey::Auth(id) => self.by_auth.insert(*id, opportunity),
            ReconnectionKey::Guest(token) => self.by_guest.insert(token.clone(), opportunity),
        };
        if let Some(old) = replaced {
            old.claim();
            tracing::debug!(%key, "replaced an open reconnection opportunity");
        }
    }

    pub fn get(&self, key: &ReconnectionKey) -> Option<Arc<ReconnectionOpportunity>> {
        match key {
            ReconnectionKey::Auth(id) => self.by_auth.get(id),
            ReconnectionKey::Guest(token) => self.by_guest.get(token),
        }
        .cloned()
    }

    pub fn remove(&mut self, key: &ReconnectionKey) -> Option<Arc<ReconnectionOpportunity>> {
        match key {
            ReconnectionKey::Auth(id) => self.by_auth.remove(id),
            ReconnectionKey::Guest(token) => self.by_guest.remove(token),
        }
    }

    pub fn len(&self) -> usize {
        self.by_auth.len() + self.by_guest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicU32>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let handle = Arc::clone(&count);
        (count, move || {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn open(
        username: &str,
        secs: u64,
        on_expire: impl FnOnce() + Send + 'static,
    ) -> Arc<ReconnectionOpportunity> {
        ReconnectionOpportunity::open(Username::new(username), Duration::from_secs(secs), on_expire)
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_returns_true_exactly_once() {
        let (_, on_expire) = counter();
        let opp = open("Bob", 120, on_expire);

        assert!(opp.claim());
        assert!(!opp.claim());
        assert!(!opp.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_cancels_timer() {
        let (expired, on_expire) = counter();
        let opp = open("Bob", 120, on_expire);
        assert!(opp.claim());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(expired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expires_once_after_duration() {
        let (expired, on_expire) = counter();
        let opp = open("Bob", 120, on_expire);

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert_eq!(expired.load(Ordering::SeqCst), 0);
        assert!(opp.is_active());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(expired.load(Ordering::SeqCst), 1);
        assert!(!opp.claim(), "an expired opportunity cannot be claimed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_after_claim_is_noop() {
        let (expired, on_expire) = counter();
        let opp = open("Bob", 120, on_expire);
        opp.claim();

        assert!(!opp.expire());
        assert_eq!(expired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_twice_runs_callback_once() {
        let (expired, on_expire) = counter();
        let opp = open("Bob", 120, on_expire);

        assert!(opp.expire());
        assert!(!opp.expire());
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_keys_do_not_collide() {
        let mut manager = ReconnectionOpportunityManager::new();
        let auth = ReconnectionKey::Auth(IdentityProviderId(1));
        let guest = ReconnectionKey::Guest(GuestReconnectionToken::new("1"));
        manager.add(auth.clone(), open("A", 1, || {}));
        manager.add(guest.clone(), open("G", 1, || {}));

        assert_eq!(manager.len(), 2);
        assert_eq!(manager.get(&auth).unwrap().username().as_str(), "A");
        assert_eq!(manager.get(&guest).unwrap().username().as_str(), "G");
        assert!(manager.remove(&auth).is_some());
        assert!(manager.get(&auth).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_add_replaces_and_silences_old() {
        let (expired, on_expire) = counter();
        let mut manager = ReconnectionOpportunityManager::new();
        let key = ReconnectionKey::Auth(IdentityProviderId(1));
        let old = open("A", 10, on_expire);
        manager.add(key.clone(), Arc::clone(&old));
        manager.add(key.clone(), open("A", 100, || {}));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!old.is_active());
        assert_eq!(expired.load(Ordering::SeqCst), 0);
        assert_eq!(manager.len(), 1);
    }
}
