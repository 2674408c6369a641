//! Message entity for private conversations.
//!
//! Messages are immutable once created. The only field the store touches is
//! `seq`, which records insertion order and breaks timestamp ties.

use crate::domain::foundation::{MessageId, Timestamp, UserId, ValidationError};
use serde::{Deserialize, Serialize};

use super::ConversationPair;

/// Who authored a message.
///
/// Downstream logic (rendering, the `isFromAi` wire flag) switches on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    /// Written by a person.
    Human,
    /// Generated by the assistant participant.
    Assistant,
}

impl MessageOrigin {
    /// Returns true for assistant-generated messages.
    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant)
    }

    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Assistant => "assistant",
        }
    }

    /// Parses the storage representation.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw {
            "human" => Ok(Self::Human),
            "assistant" => Ok(Self::Assistant),
            other => Err(ValidationError::invalid_format(
                "origin",
                format!("unknown origin '{}'", other),
            )),
        }
    }
}

/// An immutable private message between two users.
///
/// # Invariants
///
/// - `sender_id != receiver_id`
/// - `content` is non-empty after trimming
/// - `conversation` contains the receiver; for human messages it is exactly
///   the sender/receiver pair
///
/// An assistant answer is addressed to one member of the conversation the
/// question was asked in, so it carries that conversation explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    sender_id: UserId,
    receiver_id: UserId,
    conversation: ConversationPair,
    content: String,
    timestamp: Timestamp,
    origin: MessageOrigin,
    is_read: bool,
    /// Insertion order assigned by the store; `None` until appended.
    seq: Option<i64>,
}

impl Message {
    /// Creates a human-authored message stamped with the current time.
    ///
    /// # Errors
    ///
    /// - `EmptyField` if content is blank
    /// - `SelfAddressed` if sender and receiver are the same user
    pub fn new(
        sender_id: UserId,
        receiver_id: UserId,
        content: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let conversation = ConversationPair::new(sender_id, receiver_id)?;
        Self::build(
            sender_id,
            receiver_id,
            conversation,
            content.into(),
            Timestamp::now(),
            MessageOrigin::Human,
        )
    }

    /// Creates an assistant-authored answer addressed to one member of
    /// `conversation`, at an explicit time.
    ///
    /// Both answer copies of one assistant exchange share the same timestamp,
    /// so the caller supplies it.
    pub fn from_assistant(
        assistant_id: UserId,
        receiver_id: UserId,
        conversation: ConversationPair,
        content: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<Self, ValidationError> {
        if assistant_id == receiver_id {
            return Err(ValidationError::SelfAddressed);
        }
        if !conversation.contains(receiver_id) {
            return Err(ValidationError::invalid_format(
                "receiver_id",
                "not a member of the conversation",
            ));
        }
        Self::build(
            assistant_id,
            receiver_id,
            conversation,
            content.into(),
            timestamp,
            MessageOrigin::Assistant,
        )
    }

    fn build(
        sender_id: UserId,
        receiver_id: UserId,
        conversation: ConversationPair,
        content: String,
        timestamp: Timestamp,
        origin: MessageOrigin,
    ) -> Result<Self, ValidationError> {
        if content.trim().is_empty() {
            return Err(ValidationError::empty_field("content"));
        }

        Ok(Self {
            id: MessageId::new(),
            sender_id,
            receiver_id,
            conversation,
            content,
            timestamp,
            origin,
            is_read: false,
            seq: None,
        })
    }

    /// Reconstitutes a message from persistence (no validation).
    pub fn reconstitute(
        id: MessageId,
        sender_id: UserId,
        receiver_id: UserId,
        conversation: ConversationPair,
        content: String,
        timestamp: Timestamp,
        origin: MessageOrigin,
        is_read: bool,
    ) -> Self {
        Self {
            id,
            sender_id,
            receiver_id,
            conversation,
            content,
            timestamp,
            origin,
            is_read,
            seq: None,
        }
    }

    /// Returns a copy carrying the store-assigned sequence number.
    pub fn with_seq(mut self, seq: i64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender_id(&self) -> UserId {
        self.sender_id
    }

    pub fn receiver_id(&self) -> UserId {
        self.receiver_id
    }

    /// The conversation this message appears in.
    pub fn conversation(&self) -> ConversationPair {
        self.conversation
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn origin(&self) -> MessageOrigin {
        self.origin
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    pub fn seq(&self) -> Option<i64> {
        self.seq
    }

    /// Returns true if `user` is the sender or the receiver.
    pub fn involves(&self, user: UserId) -> bool {
        self.sender_id == user || self.receiver_id == user
    }
}
