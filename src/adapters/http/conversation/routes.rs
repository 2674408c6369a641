//! HTTP routes for conversation endpoints.

use axum::{routing::get, Router};

use super::handlers::{get_history, ConversationHandlers};

/// Creates the conversation router; mount under `/api/conversations`.
pub fn conversation_routes(handlers: ConversationHandlers) -> Router {
    Router::new()
        .route("/:partner_id/messages", get(get_history))
        .with_state(handlers)
}
