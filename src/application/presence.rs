//! PresenceTracker - Online/offline transitions derived from the registry.
//!
//! The registry reports whether a mutation created a user's first handle or
//! removed their last one, computed under its per-user lock. This tracker
//! only acts on those outcomes, so two handles of one user closing at the
//! same time produce exactly one offline event.
//!
//! # Ordering
//!
//! Each user's transitions run under that user's lane, from the registry
//! mutation through the last-seen write. A reconnect therefore waits for a
//! pending offline transition to finish, and observers always see a user's
//! events in the order the registry changed.
//!
//! The mutation and its broadcast also hold `edges` shared. A new connection
//! takes it exclusively while it snapshots who is online, queues its greeting
//! and registers, so no transition falls between the snapshot and the first
//! event the connection receives.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::foundation::{ConnectionId, Timestamp, UserId};
use crate::domain::messaging::{OutboundEvent, PresenceEvent};
use crate::ports::{ConnectionHandle, ConnectionRegistry, Unregistered, UserDirectory};

use super::{MessageDispatcher, UserLanes};

/// What a lifecycle hook did, for callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    CameOnline(UserId),
    WentOffline(UserId),
    Unchanged,
}

pub struct PresenceTracker {
    registry: Arc<dyn ConnectionRegistry>,
    dispatcher: MessageDispatcher,
    directory: Arc<dyn UserDirectory>,
    users: UserLanes,
    edges: RwLock<()>,
}

impl PresenceTracker {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        dispatcher: MessageDispatcher,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            directory,
            users: UserLanes::new(),
            edges: RwLock::new(()),
        }
    }

    /// Transport hook: greets and registers a new handle, and announces the
    /// user if it is their first.
    ///
    /// The greeting is queued before the handle becomes reachable, so it is
    /// always the first event on the connection.
    pub async fn connect(&self, handle: ConnectionHandle) -> PresenceChange {
        let user_id = handle.user_id;
        let connection_id = handle.id.clone();
        let _lane = self.users.acquire(user_id).await;

        let (first_for_user, replaced) = {
            let _edges = self.edges.write().await;

            let online_users = self
                .registry
                .online_users()
                .into_iter()
                .filter(|other| *other != user_id)
                .collect();
            if let Err(err) = handle.push(OutboundEvent::Connected {
                connection_id: connection_id.clone(),
                user_id,
                online_users,
            }) {
                tracing::debug!(connection_id = %connection_id, error = %err, "Could not greet connection");
            }

            let outcome = self.registry.register(handle);
            if outcome.first_for_user {
                let report = self.dispatcher.broadcast_presence(PresenceEvent::online(user_id));
                tracing::info!(user_id = %user_id, notified = report.delivered, "User online");
            }
            let replaced = outcome.replaced.filter(|r| r.was_last).map(|r| {
                self.dispatcher.broadcast_presence(PresenceEvent::offline(r.user_id));
                r.user_id
            });
            (outcome.first_for_user, replaced)
        };

        tracing::info!(connection_id = %connection_id, user_id = %user_id, "Client connected");
        if let Some(previous) = replaced {
            self.record_last_seen(previous).await;
        }

        if first_for_user {
            PresenceChange::CameOnline(user_id)
        } else {
            PresenceChange::Unchanged
        }
    }

    /// Transport hook: removes a handle and announces the user as offline if
    /// it was their last. Safe to call twice for the same handle.
    ///
    /// Last-seen is written after the offline event, still inside the user's
    /// lane. A failed write is logged.
    pub async fn disconnect(&self, connection_id: &ConnectionId) -> PresenceChange {
        let Some(owner) = self.registry.owner_of(connection_id) else {
            tracing::debug!(connection_id = %connection_id, "Disconnect for unknown handle ignored");
            return PresenceChange::Unchanged;
        };
        let _lane = self.users.acquire(owner).await;

        let removed = {
            let _edges = self.edges.read().await;
            let removed = self.registry.unregister(connection_id);
            if let Some(Unregistered { user_id, was_last: true }) = removed {
                let report = self.dispatcher.broadcast_presence(PresenceEvent::offline(user_id));
                tracing::info!(user_id = %user_id, notified = report.delivered, "User offline");
            }
            removed
        };

        match removed {
            Some(Unregistered { user_id, was_last }) => {
                tracing::info!(connection_id = %connection_id, user_id = %user_id, "Client disconnected");
                if !was_last {
                    return PresenceChange::Unchanged;
                }
                self.record_last_seen(user_id).await;
                PresenceChange::WentOffline(user_id)
            }
            None => {
                tracing::debug!(connection_id = %connection_id, "Handle already removed");
                PresenceChange::Unchanged
            }
        }
    }

    async fn record_last_seen(&self, user_id: UserId) {
        if let Err(err) = self.directory.record_last_seen(user_id, Timestamp::now()).await {
            tracing::error!(user_id = %user_id, error = %err, "Failed to record last seen");
        }
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.registry.has_any_handle(user_id)
    }
}
