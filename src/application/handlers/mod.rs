//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations. Invalid
//! input is reported as a `Rejected` outcome; `HandlerError` is reserved for
//! failures after the input was accepted.

mod ask_assistant;
mod error;
mod get_history;
mod send_message;

pub use ask_assistant::{
    resolve_identity, AskAssistantCommand, AskAssistantHandler, AskOutcome, AssistantExchange,
    AssistantPolicy,
};
pub use error::HandlerError;
pub use get_history::{
    GetHistoryHandler, GetHistoryQuery, HistoryOutcome, HistoryView, DEFAULT_HISTORY_LIMIT,
    MAX_HISTORY_LIMIT,
};
pub use send_message::{SendMessageCommand, SendMessageHandler, SendOutcome};
