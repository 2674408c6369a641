//! In-Memory User Directory Adapter
//!
//! Seeded profiles for development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::messaging::UserProfile;
use crate::ports::{DirectoryError, UserDirectory};

#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, UserProfile>>>,
    fail_writes: Arc<AtomicBool>,
    write_delay_ms: Arc<AtomicU64>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding, usable before the directory is shared.
    pub fn with_user(self, profile: UserProfile) -> Self {
        if let Ok(mut users) = self.users.try_write() {
            users.insert(profile.id, profile);
        }
        self
    }

    pub async fn insert(&self, profile: UserProfile) {
        self.users.write().await.insert(profile.id, profile);
    }

    /// Makes `record_last_seen` fail until switched off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every `record_last_seen` take at least `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn last_seen_of(&self, id: UserId) -> Option<Timestamp> {
        self.users.read().await.get(&id).and_then(|p| p.last_seen)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>, DirectoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, DirectoryError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn record_last_seen(&self, id: UserId, at: Timestamp) -> Result<(), DirectoryError> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DirectoryError::Database("injected write failure".to_string()));
        }
        let mut users = self.users.write().await;
        let profile = users.get_mut(&id).ok_or(DirectoryError::NotFound)?;
        profile.last_seen = Some(at);
        Ok(())
    }
}
