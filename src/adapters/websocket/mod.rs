//! WebSocket transport for live chat.
//!
//! Each socket becomes one `ConnectionHandle`: the presence tracker registers
//! it on upgrade and removes it on close, and everything the dispatcher pushes
//! to the handle is written to the socket in order.
//!
//! # Components
//!
//! - [`messages`] - WebSocket message protocol types
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod handler;
pub mod messages;

pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use messages::{ClientMessage, ServerMessage};
