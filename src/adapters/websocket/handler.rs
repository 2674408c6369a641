//! WebSocket upgrade handler for chat connections.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Authenticate (the auth middleware accepts `?access_token=`)
//! 2. Upgrade to WebSocket
//! 3. Register a handle with the presence tracker
//! 4. Pump the handle's outbound channel to the socket, and client frames
//!    to the application handlers, until either side stops
//! 5. Unregister the handle

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

use crate::adapters::http::middleware::RequireAuth;
use crate::application::{
    AskAssistantCommand, AskAssistantHandler, PresenceTracker, SendMessageCommand,
    SendMessageHandler,
};
use crate::domain::foundation::UserId;
use crate::domain::messaging::OutboundEvent;
use crate::ports::ConnectionHandle;

use super::messages::{AskAssistantRequest, ClientMessage, SendMessageRequest, ServerMessage};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub presence: Arc<PresenceTracker>,
    pub send_handler: Arc<SendMessageHandler>,
    pub ask_handler: Arc<AskAssistantHandler>,
    /// Capacity of each connection's outbound channel.
    pub outbound_buffer: usize,
    /// Cancelled on server shutdown.
    pub shutdown: CancellationToken,
}

/// Route: `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<WebSocketState>,
    RequireAuth(user): RequireAuth,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, user.id, state))
}

/// Runs for the lifetime of one connection.
async fn handle_socket(socket: WebSocket, user_id: UserId, state: WebSocketState) {
    let (mut sender, mut receiver) = socket.split();

    let (handle, mut outbox) = ConnectionHandle::channel(user_id, state.outbound_buffer);
    let connection_id = handle.id.clone();
    state.presence.connect(handle.clone()).await;

    // Forward queued events to the client
    let mut send_task = {
        let handle = handle.clone();
        tokio::spawn(async move {
            pump_outbox(&mut sender, &mut outbox, &handle).await;
            let _ = sender.close().await;
        })
    };

    // Handle incoming frames
    let mut recv_task = {
        let state = state.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(msg) => on_client_message(&state, &handle, msg).await,
                        Err(e) => {
                            tracing::warn!(connection_id = %handle.id, error = %e, "Ignoring malformed frame");
                        }
                    },
                    Ok(Message::Binary(_)) => {
                        tracing::warn!(connection_id = %handle.id, "Received unsupported binary message");
                    }
                    // Protocol-level ping/pong is answered by axum
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => {
                        tracing::debug!(connection_id = %handle.id, "Client sent close frame");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(connection_id = %handle.id, error = %e, "Receive error");
                        break;
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
        _ = state.shutdown.cancelled() => {
            recv_task.abort();
            send_task.abort();
        }
    }

    state.presence.disconnect(&connection_id).await;
}

async fn on_client_message(state: &WebSocketState, handle: &ConnectionHandle, msg: ClientMessage) {
    match msg {
        ClientMessage::Ping => push(handle, OutboundEvent::Pong),

        ClientMessage::SendMessage(SendMessageRequest {
            receiver_user_id,
            content,
        }) => {
            let cmd = SendMessageCommand {
                sender_id: handle.user_id,
                receiver_id: receiver_user_id,
                content,
            };
            // Rejected input is logged by the handler and not answered
            if let Err(e) = state.send_handler.handle(cmd).await {
                tracing::error!(connection_id = %handle.id, error = %e, "Send failed");
                push(handle, OutboundEvent::internal_error());
            }
        }

        ClientMessage::AskAssistant(AskAssistantRequest {
            partner_user_id,
            question,
        }) => {
            let cmd = AskAssistantCommand {
                asker_id: handle.user_id,
                partner_id: partner_user_id,
                question,
            };
            // The assistant call can take a while; keep reading frames meanwhile
            let handler = state.ask_handler.clone();
            let cancel = state.shutdown.child_token();
            let handle = handle.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.handle(cmd, cancel).await {
                    tracing::error!(connection_id = %handle.id, error = %e, "Assistant query failed");
                    push(&handle, OutboundEvent::internal_error());
                }
            });
        }
    }
}

/// Writes queued events to the socket until the queue ends, a write fails,
/// or the handle is closed server-side.
///
/// A handle closed because it fell behind stops immediately; the client
/// reconnects and catches up from history.
async fn pump_outbox<S>(sink: &mut S, outbox: &mut Receiver<OutboundEvent>, handle: &ConnectionHandle)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        let event = tokio::select! {
            biased;
            _ = handle.closed() => {
                tracing::warn!(connection_id = %handle.id, user_id = %handle.user_id, "Outbound queue overflowed, closing connection");
                break;
            }
            event = outbox.recv() => event,
        };
        let Some(event) = event else { break };

        let json = match serde_json::to_string(&ServerMessage::from(&event)) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(connection_id = %handle.id, error = %e, "Failed to encode frame");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json)).await {
            tracing::debug!(connection_id = %handle.id, error = %e, "Send error, closing connection");
            break;
        }
    }
}

fn push(handle: &ConnectionHandle, event: OutboundEvent) {
    if let Err(e) = handle.push(event) {
        tracing::debug!(connection_id = %handle.id, error = %e, "Reply dropped");
    }
}

/// Create axum router for the WebSocket endpoint.
pub fn websocket_router(state: WebSocketState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler)).with_state(state)
}
