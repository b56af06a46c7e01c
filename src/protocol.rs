//! Wire protocol definitions
//!
//! JSON-based bidirectional event protocol using Serde's tagged enum
//! for type-safe serialization/deserialization. Event and field names are
//! snake_case; the `type` field carries the event name.

use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, MessagePayload};
use crate::types::{ConnectionId, MessageId, RoomName};

/// Client → Server event
///
/// All events from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room, leaving the current one if any
    Join { username: String, room: RoomName },
    /// Send a chat message to the current room
    Chat { body: String },
    /// Indicate typing started
    Typing,
    /// Indicate typing stopped
    StopTyping,
    /// Acknowledge reading a message. `room` is absent when the message
    /// was private (private messages belong to no room).
    MessageRead {
        message_id: MessageId,
        #[serde(default)]
        room: Option<RoomName>,
    },
    /// Send a private message to another connection
    PrivateMessage {
        recipient_id: ConnectionId,
        body: String,
    },
}

/// Server → Client event
///
/// All events from server to client. Uses tagged enum with snake_case naming;
/// payload fields flatten into the event object.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection accepted, connection id issued
    Connected { connection_id: ConnectionId },
    /// A chat message or a system notice
    Message(MessagePayload),
    /// A message's read-receipt set grew
    MessageUpdated(ChatMessage),
    /// Refreshed member list of the recipient's room, in join order
    RoomUsers { users: Vec<RoomUser> },
    /// Another room member started typing
    Typing { username: String },
    /// Another room member stopped typing
    StopTyping { username: String },
    /// Full stored history of the joined room; replaces the client's view
    RoomHistory { messages: Vec<ChatMessage> },
}

/// One entry of the `room_users` member list
#[derive(Debug, Clone, Serialize)]
pub struct RoomUser {
    /// The member's connection id (clients use it to spot themselves
    /// and to address private messages)
    pub id: ConnectionId,
    /// The member's username
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageLog, SystemNotice};

    #[test]
    fn test_join_deserialize() {
        let json = r#"{"type": "join", "username": "Alice", "room": "general"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Join { username, room } => {
                assert_eq!(username, "Alice");
                assert_eq!(room, RoomName::new("general"));
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_chat_deserialize() {
        let json = r#"{"type": "chat", "body": "hello there"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Chat { body } => assert_eq!(body, "hello there"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_message_read_deserialize_without_room() {
        // Private-message receipts carry no room key
        let json = r#"{"type": "message_read", "message_id": 7}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::MessageRead { message_id, room } => {
                assert_eq!(message_id, MessageId(7));
                assert_eq!(room, None);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_private_message_deserialize() {
        let recipient = ConnectionId::new();
        let json = format!(
            r#"{{"type": "private_message", "recipient_id": "{}", "body": "psst"}}"#,
            recipient
        );
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        match msg {
            ClientMessage::PrivateMessage { recipient_id, body } => {
                assert_eq!(recipient_id, recipient);
                assert_eq!(body, "psst");
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_connected_serialize() {
        let id = ConnectionId::new();
        let msg = ServerMessage::Connected { connection_id: id };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains(&id.to_string()));
    }

    #[test]
    fn test_chat_message_event_flattens() {
        let mut log = MessageLog::new();
        let sender = ConnectionId::new();
        let chat = log.create_public("alice", sender, RoomName::new("general"), "hi".into());
        let msg = ServerMessage::Message(chat.into());
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "message");
        assert_eq!(json["username"], "alice");
        assert_eq!(json["body"], "hi");
        assert_eq!(json["id"], 1);
    }

    #[test]
    fn test_system_notice_event_flattens() {
        let msg = ServerMessage::Message(SystemNotice::new("Welcome!").into());
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "message");
        assert_eq!(json["body"], "Welcome!");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_room_users_serialize_in_order() {
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        let msg = ServerMessage::RoomUsers {
            users: vec![
                RoomUser { id: first, username: "alice".into() },
                RoomUser { id: second, username: "bob".into() },
            ],
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "room_users");
        assert_eq!(json["users"][0]["username"], "alice");
        assert_eq!(json["users"][1]["username"], "bob");
    }

    #[test]
    fn test_typing_serialize() {
        let msg = ServerMessage::Typing { username: "alice".into() };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"typing\""));
        assert!(json.contains("\"username\":\"alice\""));
    }
}
