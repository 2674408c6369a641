//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Live delivery (`MessageDispatcher`), presence (`PresenceTracker`) and
//! per-conversation ordering (`ConversationLanes`) are shared by the handlers.
//! Presence transitions are serialized per user with `UserLanes`.

mod dispatch;
pub mod handlers;
mod lanes;
mod presence;

pub use dispatch::{DeliveryReport, MessageDispatcher};
pub use handlers::{
    resolve_identity, AskAssistantCommand, AskAssistantHandler, AskOutcome, AssistantExchange,
    AssistantPolicy, GetHistoryHandler, GetHistoryQuery, HandlerError, HistoryOutcome,
    HistoryView, SendMessageCommand, SendMessageHandler, SendOutcome,
};
pub use lanes::{ConversationLanes, LaneGuard, Lanes, UserLanes};
pub use presence::{PresenceChange, PresenceTracker};
