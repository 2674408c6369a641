//! In-memory connection registry backed by sharded concurrent maps.
//!
//! # Architecture
//!
//! ```text
//! owners                      by_user
//! ├── conn-a -> alice         ├── alice -> { conn-a, conn-b }
//! ├── conn-b -> alice         └── bob   -> { conn-c }
//! └── conn-c -> bob
//! ```
//!
//! Both maps are `DashMap`s, so connects and disconnects of unrelated users
//! lock different shards and never wait on each other.
//!
//! # Atomicity
//!
//! The "first handle" and "last handle" decisions are taken while holding the
//! `by_user` entry for that user. A user key exists in `by_user` exactly when
//! the user has at least one handle.
//!
//! A guard on one map is never held while locking the other.

use std::collections::HashMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::foundation::{ConnectionId, UserId};
use crate::ports::{ConnectionHandle, ConnectionRegistry, RegisterOutcome, Unregistered};

/// Process-local registry of live connections.
#[derive(Debug, Default)]
pub struct InMemoryConnectionRegistry {
    /// handle id -> owning user.
    owners: DashMap<ConnectionId, UserId>,

    /// user -> that user's handles. Never holds an empty map.
    by_user: DashMap<UserId, HashMap<ConnectionId, ConnectionHandle>>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of live handles across all users.
    pub fn connection_count(&self) -> usize {
        self.owners.len()
    }

    /// Removes `connection_id` from `user_id`'s handle set.
    fn detach(&self, user_id: UserId, connection_id: &ConnectionId) -> Option<Unregistered> {
        match self.by_user.entry(user_id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().remove(connection_id)?;
                let was_last = entry.get().is_empty();
                if was_last {
                    entry.remove();
                }
                Some(Unregistered { user_id, was_last })
            }
            Entry::Vacant(_) => None,
        }
    }
}

impl ConnectionRegistry for InMemoryConnectionRegistry {
    fn register(&self, handle: ConnectionHandle) -> RegisterOutcome {
        let user_id = handle.user_id;
        let connection_id = handle.id.clone();

        let previous_owner = self.owners.insert(connection_id.clone(), user_id);

        let replaced = match previous_owner {
            Some(other) if other != user_id => {
                tracing::warn!(
                    connection_id = %connection_id,
                    previous_user_id = %other,
                    user_id = %user_id,
                    "Connection handle re-registered to a different user"
                );
                self.detach(other, &connection_id)
            }
            _ => None,
        };

        let first_for_user = match self.by_user.entry(user_id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().insert(connection_id.clone(), handle);
                false
            }
            Entry::Vacant(entry) => {
                let mut handles = HashMap::new();
                handles.insert(connection_id.clone(), handle);
                entry.insert(handles);
                true
            }
        };

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %user_id,
            first_for_user,
            "Connection registered"
        );

        RegisterOutcome {
            first_for_user,
            replaced,
        }
    }

    fn unregister(&self, connection_id: &ConnectionId) -> Option<Unregistered> {
        let (_, user_id) = self.owners.remove(connection_id)?;
        let outcome = self.detach(user_id, connection_id);

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %user_id,
            was_last = outcome.map(|o| o.was_last),
            "Connection unregistered"
        );

        outcome
    }

    fn owner_of(&self, connection_id: &ConnectionId) -> Option<UserId> {
        self.owners.get(connection_id).map(|owner| *owner)
    }

    fn handles_of(&self, user_id: UserId) -> Vec<ConnectionHandle> {
        self.by_user
            .get(&user_id)
            .map(|handles| handles.values().cloned().collect())
            .unwrap_or_default()
    }

    fn has_any_handle(&self, user_id: UserId) -> bool {
        self.by_user.contains_key(&user_id)
    }

    fn online_users(&self) -> Vec<UserId> {
        self.by_user.iter().map(|entry| *entry.key()).collect()
    }
}
