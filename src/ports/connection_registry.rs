//! ConnectionRegistry port - Live transport sessions per user.
//!
//! The registry is the authoritative map from connection handle to owning
//! user and the inverse user to set of handles. It is purely in-memory and
//! never suspends, so the trait is synchronous.
//!
//! Presence decisions are returned from `register` and `unregister` so they
//! are computed atomically with the mutation. Two handles of the same user
//! disconnecting at once produce exactly one `was_last == true`.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::{ConnectionId, Timestamp, UserId};
use crate::domain::messaging::OutboundEvent;

/// Why a push to a single handle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The transport side of the handle is gone.
    #[error("connection closed")]
    Closed,

    /// The connection is not draining its outbound queue. The handle is
    /// closed by this push.
    #[error("outbound buffer full")]
    Full,
}

/// One live transport session.
///
/// Cloning is cheap; clones share the same outbound channel and close state.
///
/// A handle whose buffer overflows is closed rather than left with a gap:
/// every later push fails with `Closed`, and the transport ends the session
/// so the client reconnects and re-reads history.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub connected_at: Timestamp,
    outbox: mpsc::Sender<OutboundEvent>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, user_id: UserId, outbox: mpsc::Sender<OutboundEvent>) -> Self {
        Self {
            id,
            user_id,
            connected_at: Timestamp::now(),
            outbox,
            closed: CancellationToken::new(),
        }
    }

    /// Creates a handle with a fresh bounded channel, returning the receiver
    /// the transport drains.
    pub fn channel(
        user_id: UserId,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<OutboundEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(ConnectionId::new(), user_id, tx), rx)
    }

    /// Queues an event without waiting.
    pub fn push(&self, event: OutboundEvent) -> Result<(), DeliveryError> {
        if self.closed.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        self.outbox.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                self.closed.cancel();
                DeliveryError::Full
            }
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Marks the handle closed; queued events are abandoned.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Resolves once the handle has been closed from the server side.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.outbox.is_closed()
    }
}

/// Result of registering a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOutcome {
    /// The user had no handles before this one.
    pub first_for_user: bool,
    /// The handle id was registered to a different user, who lost it.
    pub replaced: Option<Unregistered>,
}

/// Result of removing a handle that was present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unregistered {
    pub user_id: UserId,
    /// The user has no handles left.
    pub was_last: bool,
}

/// Port for tracking live connections.
///
/// All methods must be safe under unbounded concurrent callers and reflect
/// every completed write (linearizable per key).
pub trait ConnectionRegistry: Send + Sync {
    /// Adds `handle` under its user.
    ///
    /// Re-registering the same handle id for the same user is idempotent.
    /// Registering it for a different user moves it (last write wins).
    fn register(&self, handle: ConnectionHandle) -> RegisterOutcome;

    /// Removes a handle. Returns `None` if it was already gone.
    fn unregister(&self, connection_id: &ConnectionId) -> Option<Unregistered>;

    /// User a handle is registered to, if it is registered.
    fn owner_of(&self, connection_id: &ConnectionId) -> Option<UserId>;

    /// Snapshot of the user's handles.
    fn handles_of(&self, user_id: UserId) -> Vec<ConnectionHandle>;

    fn has_any_handle(&self, user_id: UserId) -> bool;

    /// Snapshot of users with at least one handle.
    fn online_users(&self) -> Vec<UserId>;
}
