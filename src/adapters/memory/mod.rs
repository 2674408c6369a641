//! In-memory persistence adapters for development and tests.

mod conversation_store;
mod user_directory;

pub use conversation_store::InMemoryConversationStore;
pub use user_directory::InMemoryUserDirectory;
