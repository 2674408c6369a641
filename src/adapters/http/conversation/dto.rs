//! HTTP DTOs for conversation endpoints.

use serde::{Deserialize, Serialize};

use crate::adapters::http::dto::MessageView;
use crate::application::HistoryView;
use crate::domain::messaging::HistoryCursor;

/// Query parameters for `GET /api/conversations/:partner_id/messages`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    /// RFC 3339 timestamp; only older messages are returned.
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub before_seq: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One page of history, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub items: Vec<MessageView>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<HistoryCursor>,
}

impl From<HistoryView> for HistoryResponse {
    fn from(view: HistoryView) -> Self {
        Self {
            items: view.items.iter().map(MessageView::from).collect(),
            has_more: view.has_more,
            next_cursor: view.next_cursor,
        }
    }
}
