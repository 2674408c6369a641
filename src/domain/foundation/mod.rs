//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, error types and the auth vocabulary
//! used by every other layer.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ConnectionId, MessageId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
