//! Conversation scoping and history pagination types.
//!
//! A conversation is never stored; it is the set of messages exchanged
//! between an unordered pair of users.

use crate::domain::foundation::{Timestamp, UserId, ValidationError};
use serde::{Deserialize, Serialize};

use super::Message;

/// Unordered pair of distinct users.
///
/// Normalised so that `ConversationPair::new(a, b) == ConversationPair::new(b, a)`,
/// which lets it key per-conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationPair {
    low: UserId,
    high: UserId,
}

impl ConversationPair {
    /// Creates a pair, rejecting a user paired with themselves.
    pub fn new(a: UserId, b: UserId) -> Result<Self, ValidationError> {
        if a == b {
            return Err(ValidationError::SelfAddressed);
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }

    /// Returns the pair a message belongs to.
    pub fn of(message: &Message) -> Self {
        message.conversation()
    }

    /// Returns both participants in normalised order.
    pub fn members(&self) -> (UserId, UserId) {
        (self.low, self.high)
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.low == user || self.high == user
    }

    /// Returns true if the message appears in this pair's history.
    pub fn includes(&self, message: &Message) -> bool {
        message.conversation() == *self
    }
}

/// Exclusive upper bound for a history page.
///
/// With only `before`, every message strictly older than it qualifies. With
/// `before_seq` as well, the bound is the keyset `(timestamp, seq) < (before, before_seq)`,
/// which splits groups of equal timestamps without skipping or repeating rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCursor {
    pub before: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_seq: Option<i64>,
}

impl HistoryCursor {
    /// Timestamp-only cursor (strictly exclusive on time).
    pub fn before(before: Timestamp) -> Self {
        Self {
            before,
            before_seq: None,
        }
    }

    /// Keyset cursor positioned just past `message`.
    pub fn after_message(message: &Message) -> Self {
        Self {
            before: message.timestamp(),
            before_seq: message.seq(),
        }
    }

    /// Returns true if the message lies strictly below this cursor.
    pub fn admits(&self, message: &Message) -> bool {
        match (self.before_seq, message.seq()) {
            (Some(cursor_seq), Some(seq)) => {
                (message.timestamp(), seq) < (self.before, cursor_seq)
            }
            _ => message.timestamp() < self.before,
        }
    }
}

/// One page of conversation history, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    pub items: Vec<Message>,
    /// True when exactly `limit` rows came back; older rows may exist.
    pub has_more: bool,
    /// Cursor for the next (older) page, taken from the oldest item.
    pub next_cursor: Option<HistoryCursor>,
}

impl HistoryPage {
    /// Builds a page from rows already sorted newest first.
    pub fn from_descending(items: Vec<Message>, limit: usize) -> Self {
        let has_more = limit > 0 && items.len() == limit;
        let next_cursor = items.last().map(HistoryCursor::after_message);
        Self {
            items,
            has_more,
            next_cursor,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
            next_cursor: None,
        }
    }
}
