//! In-Memory Conversation Store Adapter
//!
//! Keeps the message log in memory with the same visibility rules as the
//! PostgreSQL adapter: transactional rows appear only on commit, sequence
//! numbers are allocated at append time and are not reused after a rollback.
//! Useful for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::domain::foundation::MessageId;
use crate::domain::messaging::{ConversationPair, HistoryCursor, HistoryPage, Message};
use crate::ports::{ConversationStore, ConversationTransaction, StoreError};

#[derive(Debug, Default)]
struct Log {
    rows: Vec<Message>,
    by_id: HashMap<MessageId, usize>,
}

impl Log {
    fn get(&self, id: &MessageId) -> Option<&Message> {
        self.by_id.get(id).map(|&i| &self.rows[i])
    }

    fn push(&mut self, message: Message) {
        self.by_id.insert(message.id(), self.rows.len());
        self.rows.push(message);
    }
}

/// Injected failures, for exercising rollback paths in tests.
#[derive(Debug, Default)]
struct Faults {
    /// Number of appends that still succeed before every append fails.
    appends_left: Mutex<Option<usize>>,
    fail_commit: AtomicBool,
}

impl Faults {
    fn check_append(&self) -> Result<(), StoreError> {
        let mut left = self
            .appends_left
            .lock()
            .map_err(|_| StoreError::Database("fault plan poisoned".to_string()))?;
        match left.as_mut() {
            Some(0) => Err(StoreError::Database("injected append failure".to_string())),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// In-memory message log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationStore {
    log: Arc<RwLock<Log>>,
    next_seq: Arc<AtomicI64>,
    faults: Arc<Faults>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every append after the next `n` fail with a database error.
    pub fn fail_after_appends(&self, n: usize) {
        if let Ok(mut left) = self.faults.appends_left.lock() {
            *left = Some(n);
        }
    }

    /// Makes the next commit fail (the transaction's rows are discarded).
    pub fn fail_next_commit(&self) {
        self.faults.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Number of committed messages.
    pub async fn len(&self) -> usize {
        self.log.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every committed message in insertion order.
    pub async fn all(&self) -> Vec<Message> {
        self.log.read().await.rows.clone()
    }

    fn allocate_seq(&self) -> i64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, message: &Message) -> Result<Message, StoreError> {
        self.faults.check_append()?;

        let mut log = self.log.write().await;
        if let Some(existing) = log.get(&message.id()) {
            return Ok(existing.clone());
        }
        let stored = message.clone().with_seq(self.allocate_seq());
        log.push(stored.clone());
        Ok(stored)
    }

    async fn get_history(
        &self,
        pair: ConversationPair,
        cursor: Option<HistoryCursor>,
        limit: usize,
    ) -> Result<HistoryPage, StoreError> {
        let log = self.log.read().await;

        let mut rows: Vec<Message> = log
            .rows
            .iter()
            .filter(|m| pair.includes(m))
            .filter(|m| cursor.map_or(true, |c| c.admits(m)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.timestamp(), b.seq()).cmp(&(a.timestamp(), a.seq())));
        rows.truncate(limit);

        Ok(HistoryPage::from_descending(rows, limit))
    }

    async fn begin(&self) -> Result<Box<dyn ConversationTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            pending: Vec::new(),
        }))
    }
}

/// Pending rows of one open scope.
struct InMemoryTransaction {
    store: InMemoryConversationStore,
    pending: Vec<Message>,
}

#[async_trait]
impl ConversationTransaction for InMemoryTransaction {
    async fn append(&mut self, message: &Message) -> Result<Message, StoreError> {
        self.store.faults.check_append()?;

        if let Some(existing) = self.pending.iter().find(|m| m.id() == message.id()) {
            return Ok(existing.clone());
        }
        if let Some(existing) = self.store.log.read().await.get(&message.id()) {
            return Ok(existing.clone());
        }

        let stored = message.clone().with_seq(self.store.allocate_seq());
        self.pending.push(stored.clone());
        Ok(stored)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.store.faults.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database("injected commit failure".to_string()));
        }

        let mut log = self.store.log.write().await;
        for message in self.pending {
            if log.get(&message.id()).is_none() {
                log.push(message);
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
