//! Wire types shared by the HTTP and WebSocket adapters.

use serde::Serialize;

use crate::domain::messaging::DeliveredMessage;

/// Wire form of a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub sender_id: String,
    pub sender_display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_avatar_url: Option<String>,
    pub receiver_id: String,
    pub content: String,
    /// RFC 3339 with microseconds.
    pub timestamp: String,
    pub origin: &'static str,
    pub is_from_ai: bool,
    pub is_read: bool,
    /// Absent on a live copy delivered before the message was stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
}

impl From<&DeliveredMessage> for MessageView {
    fn from(delivered: &DeliveredMessage) -> Self {
        let message = &delivered.message;
        Self {
            id: message.id().to_string(),
            sender_id: message.sender_id().to_string(),
            sender_display_name: delivered.sender_display_name.clone(),
            sender_avatar_url: delivered.sender_avatar_url.clone(),
            receiver_id: message.receiver_id().to_string(),
            content: message.content().to_string(),
            timestamp: message.timestamp().to_rfc3339(),
            origin: message.origin().as_str(),
            is_from_ai: message.origin().is_assistant(),
            is_read: message.is_read(),
            seq: message.seq(),
        }
    }
}

/// Error body for every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            code: "UNAUTHORIZED".to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: "NOT_FOUND".to_string(),
            message: message.into(),
        }
    }

    /// Internal failure. The detail stays in the logs.
    pub fn internal() -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: "An internal error occurred".to_string(),
        }
    }
}
