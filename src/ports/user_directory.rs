//! UserDirectory port - Read access to the identity subsystem's users.
//!
//! This core only reads profiles. The single write is the last-seen time,
//! recorded when a user's final connection closes.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::messaging::UserProfile;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("User not found")]
    NotFound,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>, DirectoryError>;

    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, DirectoryError>;

    /// # Errors
    ///
    /// - `NotFound` if the user does not exist
    async fn record_last_seen(&self, id: UserId, at: Timestamp) -> Result<(), DirectoryError>;
}
