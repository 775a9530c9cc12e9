//! Reference-counted lock used to pause gameplay input.

use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use waypoint_protocol::TaggedUserId;

/// A lock held by a set of owners; locked while any owner holds it.
///
/// `add` and `remove` are idempotent, so an owner counts once however
/// many times it is added. Unlike a plain boolean flag, two overlapping
/// holders cannot release each other's hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: Deserialize<'de>"
))]
pub struct ReferenceCountedLock<T: Eq + Hash> {
    holders: HashSet<T>,
}

impl<T: Eq + Hash> ReferenceCountedLock<T> {
    pub fn new() -> Self {
        Self {
            holders: HashSet::new(),
        }
    }

    /// Takes a hold. Returns `false` if `holder` already held one.
    pub fn add(&mut self, holder: T) -> bool {
        self.holders.insert(holder)
    }

    /// Releases a hold. Returns `false` if `holder` held none.
    pub fn remove(&mut self, holder: &T) -> bool {
        self.holders.remove(holder)
    }

    /// `true` iff at least one holder remains.
    pub fn is_locked(&self) -> bool {
        !self.holders.is_empty()
    }

    pub fn is_held_by(&self, holder: &T) -> bool {
        self.holders.contains(holder)
    }

    /// Number of distinct holders.
    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }
}

impl<T: Eq + Hash> Default for ReferenceCountedLock<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-game gameplay gate, held by members who are mid-reconnection.
pub type InputLock = ReferenceCountedLock<TaggedUserId>;
