//! WebSocket message types for the chat protocol.
//!
//! Defines the protocol between server and connected clients:
//! - Server → Client: connection status, presence, messages, errors, pongs
//! - Client → Server: sends, assistant questions, pings
//!
//! Frames are JSON objects tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::adapters::http::dto::MessageView;
use crate::domain::foundation::Timestamp;
use crate::domain::messaging::OutboundEvent;

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection registered.
    Connected(ConnectedMessage),

    UserOnline(PresenceMessage),

    UserOffline(PresenceMessage),

    /// A message addressed to, or sent by, this user.
    MessageReceived(MessageReceivedMessage),

    Error(ErrorMessage),

    /// Heartbeat response.
    Pong(PongMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub connection_id: String,
    pub user_id: String,
    /// Other users online when the connection opened.
    pub online_user_ids: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMessage {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageReceivedMessage {
    pub message: MessageView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PongMessage {
    pub timestamp: String,
}

impl From<&OutboundEvent> for ServerMessage {
    fn from(event: &OutboundEvent) -> Self {
        match event {
            OutboundEvent::Connected {
                connection_id,
                user_id,
                online_users,
            } => ServerMessage::Connected(ConnectedMessage {
                connection_id: connection_id.to_string(),
                user_id: user_id.to_string(),
                online_user_ids: online_users.iter().map(ToString::to_string).collect(),
                timestamp: Timestamp::now().to_rfc3339(),
            }),
            OutboundEvent::Presence(presence) => {
                let payload = PresenceMessage {
                    user_id: presence.user_id.to_string(),
                };
                if presence.is_online {
                    ServerMessage::UserOnline(payload)
                } else {
                    ServerMessage::UserOffline(payload)
                }
            }
            OutboundEvent::MessageReceived(delivered) => {
                ServerMessage::MessageReceived(MessageReceivedMessage {
                    message: MessageView::from(delivered),
                })
            }
            OutboundEvent::Error { code, message } => ServerMessage::Error(ErrorMessage {
                code: code.clone(),
                message: message.clone(),
                timestamp: Timestamp::now().to_rfc3339(),
            }),
            OutboundEvent::Pong => ServerMessage::Pong(PongMessage {
                timestamp: Timestamp::now().to_rfc3339(),
            }),
        }
    }
}

// ============================================
// Client → Server Messages
// ============================================

/// All message types that can be received from client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SendMessage(SendMessageRequest),

    AskAssistant(AskAssistantRequest),

    /// Heartbeat request.
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_user_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskAssistantRequest {
    pub partner_user_id: String,
    pub question: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ConnectionId, UserId};
    use crate::domain::messaging::PresenceEvent;

    #[test]
    fn parses_send_message() {
        let json = r#"{"type":"send_message","receiverUserId":"abc","content":"hi"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SendMessage(SendMessageRequest {
                receiver_user_id: "abc".into(),
                content: "hi".into(),
            })
        );
    }

    #[test]
    fn parses_ask_assistant_and_ping() {
        let json = r#"{"type":"ask_assistant","partnerUserId":"p","question":"2+2?"}"#;
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(json).unwrap(),
            ClientMessage::AskAssistant(_)
        ));
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        );
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn presence_events_map_to_typed_frames() {
        let user = UserId::new();

        let online = serde_json::to_value(ServerMessage::from(&OutboundEvent::Presence(PresenceEvent::online(user)))).unwrap();
        assert_eq!(online["type"], "user_online");
        assert_eq!(online["userId"], user.to_string());

        let offline = serde_json::to_value(ServerMessage::from(&OutboundEvent::Presence(PresenceEvent::offline(user)))).unwrap();
        assert_eq!(offline["type"], "user_offline");
    }

    #[test]
    fn connected_frame_carries_connection_id_and_online_users() {
        let bob = UserId::new();
        let event = OutboundEvent::Connected {
            connection_id: ConnectionId::from("conn-1"),
            user_id: UserId::new(),
            online_users: vec![bob],
        };
        let json = serde_json::to_value(ServerMessage::from(&event)).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["connectionId"], "conn-1");
        assert_eq!(json["onlineUserIds"], serde_json::json!([bob.to_string()]));
    }

    #[test]
    fn error_frame_has_code() {
        let json = serde_json::to_value(ServerMessage::from(&OutboundEvent::internal_error())).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "INTERNAL_ERROR");
    }
}
