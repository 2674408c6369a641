//! SendMessageHandler - Persist a private message, then deliver it.

use std::sync::Arc;

use crate::domain::foundation::{UserId, ValidationError};
use crate::domain::messaging::{ConversationPair, DeliveredMessage, Message};
use crate::ports::{ConversationStore, UserDirectory};

use super::HandlerError;
use crate::application::{ConversationLanes, MessageDispatcher};

/// Command to send a private message.
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub sender_id: UserId,
    /// Receiver id as received from the client.
    pub receiver_id: String,
    pub content: String,
}

/// Result of a send.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Stored, then pushed to the receiver and echoed to the sender.
    Sent(DeliveredMessage),
    /// Input was invalid; nothing was written.
    Rejected(ValidationError),
}

/// Handler for sending private messages.
pub struct SendMessageHandler {
    store: Arc<dyn ConversationStore>,
    directory: Arc<dyn UserDirectory>,
    dispatcher: MessageDispatcher,
    lanes: ConversationLanes,
}

impl SendMessageHandler {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        directory: Arc<dyn UserDirectory>,
        dispatcher: MessageDispatcher,
        lanes: ConversationLanes,
    ) -> Self {
        Self {
            store,
            directory,
            dispatcher,
            lanes,
        }
    }

    pub async fn handle(&self, cmd: SendMessageCommand) -> Result<SendOutcome, HandlerError> {
        // 1. Validate before touching storage
        let receiver_id = match UserId::parse(&cmd.receiver_id) {
            Ok(id) => id,
            Err(err) => return Ok(reject(cmd.sender_id, err)),
        };
        let pair = match ConversationPair::new(cmd.sender_id, receiver_id) {
            Ok(pair) => pair,
            Err(err) => return Ok(reject(cmd.sender_id, err)),
        };
        let sender = match self.directory.find_by_id(cmd.sender_id).await? {
            Some(profile) => profile,
            None => {
                return Ok(reject(
                    cmd.sender_id,
                    ValidationError::invalid_format("sender_id", "unknown user"),
                ))
            }
        };

        // 2. Stamp, persist and deliver in conversation order
        let _lane = self.lanes.acquire(pair).await;
        let message = match Message::new(cmd.sender_id, receiver_id, cmd.content) {
            Ok(m) => m,
            Err(err) => return Ok(reject(cmd.sender_id, err)),
        };

        let stored = self.store.append(&message).await.map_err(|err| {
            tracing::error!(
                message_id = %message.id(),
                sender_id = %cmd.sender_id,
                error = %err,
                "Failed to persist message"
            );
            err
        })?;

        let delivered = DeliveredMessage {
            message: stored,
            sender_display_name: sender.display_name,
            sender_avatar_url: sender.avatar_url,
        };
        let report = self.dispatcher.deliver_message(&delivered);

        tracing::debug!(
            message_id = %delivered.message.id(),
            sender_id = %cmd.sender_id,
            receiver_id = %receiver_id,
            delivered = report.delivered,
            "Message sent"
        );

        Ok(SendOutcome::Sent(delivered))
    }
}

fn reject(sender_id: UserId, reason: ValidationError) -> SendOutcome {
    tracing::warn!(sender_id = %sender_id, reason = %reason, "Rejected send");
    SendOutcome::Rejected(reason)
}
