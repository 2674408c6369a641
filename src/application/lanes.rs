//! Keyed lanes - Per-key serialization of async critical sections.
//!
//! `ConversationLanes` serializes persist-then-deliver per pair: every write
//! path for a pair (plain sends and the assistant commit) runs while holding
//! that pair's lane, so the order in which messages are committed is the
//! order in which they are pushed to connections. `UserLanes` does the same
//! for one user's presence transitions.
//!
//! Unrelated keys use different lanes and never contend. Lanes are created
//! on demand and dropped once nobody holds or waits on them.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::foundation::UserId;
use crate::domain::messaging::ConversationPair;

type LaneMap<K> = DashMap<K, Arc<Mutex<()>>>;

/// One async mutex per key.
pub struct Lanes<K: Eq + Hash> {
    lanes: Arc<LaneMap<K>>,
}

pub type ConversationLanes = Lanes<ConversationPair>;
pub type UserLanes = Lanes<UserId>;

/// Exclusive access to one key's lane.
pub struct LaneGuard<K: Eq + Hash> {
    key: K,
    lanes: Arc<LaneMap<K>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Copy> Lanes<K> {
    pub fn new() -> Self {
        Self {
            lanes: Arc::new(DashMap::new()),
        }
    }

    /// Waits for and takes the lane of `key`.
    pub async fn acquire(&self, key: K) -> LaneGuard<K> {
        let lane = self
            .lanes
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        LaneGuard {
            key,
            lanes: self.lanes.clone(),
            guard: Some(lane.lock_owned().await),
        }
    }

    /// Number of lanes currently held or awaited.
    pub fn active(&self) -> usize {
        self.lanes.len()
    }
}

impl<K: Eq + Hash> Clone for Lanes<K> {
    fn clone(&self) -> Self {
        Self {
            lanes: self.lanes.clone(),
        }
    }
}

impl<K: Eq + Hash + Copy> Default for Lanes<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Drop for LaneGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits.
        self.lanes
            .remove_if(&self.key, |_, lane| Arc::strong_count(lane) == 1);
    }
}
