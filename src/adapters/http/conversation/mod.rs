//! HTTP adapter for conversation history.

mod dto;
mod handlers;
mod routes;

pub use dto::{HistoryParams, HistoryResponse};
pub use handlers::{get_history, ConversationHandlers};
pub use routes::conversation_routes;
