//! GetHistoryHandler - One page of a conversation, newest first.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId, ValidationError};
use crate::domain::messaging::{ConversationPair, DeliveredMessage, HistoryCursor, UserProfile};
use crate::ports::{ConversationStore, UserDirectory};

use super::HandlerError;

/// Page size used when the caller gives none.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Largest page a caller may request.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Query for one history page.
#[derive(Debug, Clone)]
pub struct GetHistoryQuery {
    pub user_id: UserId,
    /// Partner id as received from the client.
    pub partner_id: String,
    /// Exclusive upper bound; omitted for the newest page.
    pub before: Option<Timestamp>,
    /// Tie-breaker within `before`, from a previous page's cursor.
    pub before_seq: Option<i64>,
    pub limit: Option<usize>,
}

/// One page, with sender names resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryView {
    pub items: Vec<DeliveredMessage>,
    pub has_more: bool,
    pub next_cursor: Option<HistoryCursor>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    Page(HistoryView),
    Rejected(ValidationError),
}

/// Handler for history queries.
pub struct GetHistoryHandler {
    store: Arc<dyn ConversationStore>,
    directory: Arc<dyn UserDirectory>,
    default_limit: usize,
    max_limit: usize,
}

impl GetHistoryHandler {
    pub fn new(store: Arc<dyn ConversationStore>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            store,
            directory,
            default_limit: DEFAULT_HISTORY_LIMIT,
            max_limit: MAX_HISTORY_LIMIT,
        }
    }

    /// Overrides the default and maximum page sizes.
    pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self.default_limit = default_limit.clamp(1, self.max_limit);
        self
    }

    pub async fn handle(&self, query: GetHistoryQuery) -> Result<HistoryOutcome, HandlerError> {
        let partner_id = match UserId::parse(&query.partner_id) {
            Ok(id) => id,
            Err(err) => return Ok(HistoryOutcome::Rejected(err)),
        };
        let pair = match ConversationPair::new(query.user_id, partner_id) {
            Ok(pair) => pair,
            Err(err) => return Ok(HistoryOutcome::Rejected(err)),
        };

        let limit = query.limit.unwrap_or(self.default_limit).min(self.max_limit);
        let cursor = query.before.map(|before| HistoryCursor {
            before,
            before_seq: query.before_seq,
        });

        let page = self.store.get_history(pair, cursor, limit).await?;

        // Most pages involve two or three senders
        let mut senders: HashMap<UserId, Option<UserProfile>> = HashMap::new();
        let mut items = Vec::with_capacity(page.items.len());
        for message in page.items {
            let sender_id = message.sender_id();
            if !senders.contains_key(&sender_id) {
                let profile = self.directory.find_by_id(sender_id).await?;
                senders.insert(sender_id, profile);
            }
            let profile = senders.get(&sender_id).and_then(Option::as_ref);
            items.push(DeliveredMessage {
                sender_display_name: profile
                    .map(|p| p.display_name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                sender_avatar_url: profile.and_then(|p| p.avatar_url.clone()),
                message,
            });
        }

        Ok(HistoryOutcome::Page(HistoryView {
            items,
            has_more: page.has_more,
            next_cursor: page.next_cursor,
        }))
    }
}
