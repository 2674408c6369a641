//! The assistant participant and the fixed texts it speaks with.

use crate::domain::foundation::UserId;
use serde::{Deserialize, Serialize};

/// Prefix stored in front of a question addressed to the assistant.
pub const QUESTION_PREFIX: &str = "(Question for AI): ";

/// Answer text used when the assistant fails, times out or returns nothing.
pub const DEFAULT_FALLBACK_TEXT: &str = "I'm sorry, I couldn't process that request.";

/// System prompt sent with every assistant request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant in a chat application. Keep your responses concise and friendly.";

/// Directory email under which the assistant user is seeded.
pub const DEFAULT_ASSISTANT_EMAIL: &str = "ai@chatapp.system";

/// Id used when the directory has no assistant user.
pub const DEFAULT_ASSISTANT_USER_ID: &str = "c82dcc58-9f57-4419-8439-94dff46dba5a";

pub const DEFAULT_ASSISTANT_DISPLAY_NAME: &str = "AI Assistant";

/// Builds the stored content of a question message.
pub fn question_content(question: &str) -> String {
    format!("{}{}", QUESTION_PREFIX, question.trim())
}

/// Resolved identity of the assistant participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantIdentity {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl AssistantIdentity {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            avatar_url: None,
        }
    }
}

/// When a question is shown live relative to the commit of the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionDelivery {
    /// Deliver question and answers only after all three rows are committed.
    #[default]
    AfterCommit,
    /// Deliver the question before the assistant is called. A rolled back
    /// exchange may leave a live copy that never reaches history.
    Eager,
}
