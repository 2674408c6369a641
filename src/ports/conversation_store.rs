//! ConversationStore port - Durable, ordered message log.
//!
//! # Design
//!
//! - **Append-only**: messages are immutable once stored
//! - **Idempotent by id**: appending an existing id returns the stored row
//! - **Pair-scoped reads**: history is always read for one unordered pair
//! - **Atomic scopes**: `begin` opens a transaction for multi-message writes

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::messaging::{ConversationPair, HistoryCursor, HistoryPage, Message};

/// Errors raised by conversation storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    /// A different message already holds this id.
    #[error("Duplicate message id: {0}")]
    Duplicate(String),

    #[error("Not found")]
    NotFound,

    /// The transaction was already committed, rolled back or aborted.
    #[error("Transaction is no longer open")]
    TransactionClosed,
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        DomainError::new(ErrorCode::DatabaseError, err.to_string())
    }
}

/// Repository port for the message log.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persists one message on its own and returns the stored form, which
    /// carries the store-assigned `seq`.
    ///
    /// Appending a message whose id is already stored returns the original
    /// row unchanged.
    ///
    /// # Errors
    ///
    /// - `Database` on persistence failure; nothing is observable afterwards
    async fn append(&self, message: &Message) -> Result<Message, StoreError>;

    /// Returns up to `limit` messages of the pair strictly below `cursor`,
    /// newest first.
    ///
    /// Ties on timestamp are ordered by `seq`, so paging with
    /// `HistoryPage::next_cursor` visits every message exactly once.
    async fn get_history(
        &self,
        pair: ConversationPair,
        cursor: Option<HistoryCursor>,
        limit: usize,
    ) -> Result<HistoryPage, StoreError>;

    /// Opens an atomic scope.
    async fn begin(&self) -> Result<Box<dyn ConversationTransaction>, StoreError>;
}

/// An open atomic scope over the message log.
///
/// Rows appended through the scope become visible to other readers only on
/// `commit`. Dropping the scope without committing discards them.
#[async_trait]
pub trait ConversationTransaction: Send {
    async fn append(&mut self, message: &Message) -> Result<Message, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
