//! PostgreSQL adapters - Database implementations for persistence ports.
//!
//! - `PostgresConversationStore` - Message log with transactional scopes
//! - `PostgresUserDirectory` - Profile lookup and last-seen updates

mod conversation_store;
mod user_directory;

pub use conversation_store::{PostgresConversationStore, PostgresConversationTransaction};
pub use user_directory::PostgresUserDirectory;
