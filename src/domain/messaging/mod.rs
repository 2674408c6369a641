//! Messaging domain module.
//!
//! Private messages, conversation pairs, history paging, presence and the
//! payloads pushed to live connections.

mod conversation;
mod delivery;
mod message;
mod presence;

pub use conversation::{ConversationPair, HistoryCursor, HistoryPage};
pub use delivery::{DeliveredMessage, OutboundEvent};
pub use message::{Message, MessageOrigin};
pub use presence::{PresenceEvent, UserProfile};
