//! Payloads pushed to live connections.

use crate::domain::foundation::{ConnectionId, ErrorCode, MessageId, UserId};

use super::{Message, PresenceEvent};

/// A message enriched with the sender's display data for live delivery.
///
/// Sender details are resolved by lookup at send time; the message itself
/// only stores ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub message: Message,
    pub sender_display_name: String,
    pub sender_avatar_url: Option<String>,
}

/// Event queued on a connection's outbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Sent once, ahead of any other event on the connection.
    ///
    /// `online_users` lists the other users online at that moment; later
    /// presence events on the same connection apply on top of it.
    Connected {
        connection_id: ConnectionId,
        user_id: UserId,
        online_users: Vec<UserId>,
    },
    Presence(PresenceEvent),
    MessageReceived(DeliveredMessage),
    /// Generic failure of a call made on this connection.
    Error { code: String, message: String },
    /// Reply to a client heartbeat.
    Pong,
}

impl OutboundEvent {
    pub fn message(delivered: DeliveredMessage) -> Self {
        Self::MessageReceived(delivered)
    }

    /// Generic internal failure; the detail stays in the logs.
    pub fn internal_error() -> Self {
        Self::Error {
            code: ErrorCode::InternalError.to_string(),
            message: "The request could not be completed".to_string(),
        }
    }

    /// Returns the message id for message events.
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            Self::MessageReceived(d) => Some(d.message.id()),
            _ => None,
        }
    }
}
