//! HTTP adapters - REST API implementations.
//!
//! Each area has its own module with dto, handlers and routes.

pub mod conversation;
pub mod dto;
pub mod health;
pub mod middleware;

pub use conversation::{conversation_routes, ConversationHandlers};
pub use dto::{ErrorResponse, MessageView};
pub use health::health_routes;
