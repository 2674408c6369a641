//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Live Connections
//!
//! - `ConnectionRegistry` - Live transport sessions per user (synchronous, in-memory)
//!
//! ## Persistence
//!
//! - `ConversationStore` / `ConversationTransaction` - Message log and atomic scopes
//! - `UserDirectory` - Profile lookup and last-seen bookkeeping
//!
//! ## External Capabilities
//!
//! - `AIProvider` - The assistant's language generation
//! - `SessionValidator` - Bearer token validation

mod ai_provider;
mod connection_registry;
mod conversation_store;
mod session_validator;
mod user_directory;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, MessageRole,
    PromptMessage, ProviderInfo, RequestMetadata, TokenUsage,
};
pub use connection_registry::{
    ConnectionHandle, ConnectionRegistry, DeliveryError, RegisterOutcome, Unregistered,
};
pub use conversation_store::{ConversationStore, ConversationTransaction, StoreError};
pub use session_validator::SessionValidator;
pub use user_directory::{DirectoryError, UserDirectory};
