//! Chat message records and the message log
//!
//! `ChatMessage` is the persisted message shape shared by room broadcasts,
//! private delivery, read-receipt updates, and history replay. `MessageLog`
//! owns message creation: the monotonic id counter and the index of private
//! messages (which belong to no room but still take read receipts).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{ConnectionId, MessageId, RoomName};

/// Author name stamped on system notices (welcome, join/leave, errors)
pub const SYSTEM_AUTHOR: &str = "ChatBot";

/// A chat-originated message, public or private
///
/// Immutable once created except for `read_by`, which only grows.
/// Public messages carry their room; private messages carry `room: None`
/// and a `recipient_id` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Unique, strictly increasing per process
    pub id: MessageId,
    /// Author's username at send time
    pub username: String,
    /// Message text
    pub body: String,
    /// Owning room; `None` for private messages
    pub room: Option<RoomName>,
    /// Creation time (RFC 3339 on the wire)
    pub timestamp: DateTime<Utc>,
    /// Whether this is a point-to-point private message
    pub is_private: bool,
    /// Connection that authored the message
    pub sender_id: ConnectionId,
    /// Target connection, private messages only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<ConnectionId>,
    /// Connections that have acknowledged reading this message.
    /// Always contains `sender_id`; grows in acknowledgement order.
    pub read_by: Vec<ConnectionId>,
}

impl ChatMessage {
    /// Record a read receipt
    ///
    /// Returns true if the reader was newly added, false if they had
    /// already read the message (re-marking is a safe no-op).
    pub fn mark_read_by(&mut self, reader: ConnectionId) -> bool {
        if self.read_by.contains(&reader) {
            false
        } else {
            self.read_by.push(reader);
            true
        }
    }
}

/// Transient server-authored text
///
/// Delivered under the same `message` event as chat messages so clients
/// render both through one path. Notices are never stored and carry no
/// id, so read receipts do not apply to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemNotice {
    /// Always [`SYSTEM_AUTHOR`]
    pub username: String,
    /// Notice text
    pub body: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl SystemNotice {
    /// Create a notice with the system author and the current time
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            username: SYSTEM_AUTHOR.to_string(),
            body: body.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Payload of the outbound `message` event
///
/// Untagged: both variants serialize as bare objects, so chat messages and
/// notices share the one `message` event name. Receivers tell them apart
/// by the presence of `id`/`read_by`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessagePayload {
    /// A real chat message (public or private)
    Chat(ChatMessage),
    /// A system notice
    System(SystemNotice),
}

impl From<ChatMessage> for MessagePayload {
    fn from(msg: ChatMessage) -> Self {
        Self::Chat(msg)
    }
}

impl From<SystemNotice> for MessagePayload {
    fn from(notice: SystemNotice) -> Self {
        Self::System(notice)
    }
}

/// Message factory and read-receipt lookup support
///
/// Holds the monotonic id counter backing every message created in this
/// process, plus the private-message index: private messages live in no
/// room history, so read receipts locate them here by id.
///
/// Room histories themselves are owned by the room store; the log only
/// creates messages and retains the private ones.
#[derive(Debug, Default)]
pub struct MessageLog {
    /// Last id handed out; 0 means none yet
    next_id: u64,
    /// Private messages by id, for receipt lookup
    private: HashMap<MessageId, ChatMessage>,
}

impl MessageLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next message id
    fn next_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId(self.next_id)
    }

    /// Create a public room message
    ///
    /// Fresh id, current timestamp, and `read_by` seeded with the sender
    /// (the author has implicitly read their own message). The caller
    /// appends the result to the room's history.
    pub fn create_public(
        &mut self,
        username: &str,
        sender_id: ConnectionId,
        room: RoomName,
        body: String,
    ) -> ChatMessage {
        ChatMessage {
            id: self.next_id(),
            username: username.to_string(),
            body,
            room: Some(room),
            timestamp: Utc::now(),
            is_private: false,
            sender_id,
            recipient_id: None,
            read_by: vec![sender_id],
        }
    }

    /// Create a private message
    ///
    /// Same id/timestamp/read-by rules as public messages, but the message
    /// joins no room history; the log keeps a copy in its private index so
    /// later read receipts can find it.
    pub fn create_private(
        &mut self,
        username: &str,
        sender_id: ConnectionId,
        recipient_id: ConnectionId,
        body: String,
    ) -> ChatMessage {
        let msg = ChatMessage {
            id: self.next_id(),
            username: username.to_string(),
            body,
            room: None,
            timestamp: Utc::now(),
            is_private: true,
            sender_id,
            recipient_id: Some(recipient_id),
            read_by: vec![sender_id],
        };
        self.private.insert(msg.id, msg.clone());
        msg
    }

    /// Locate a private message for a receipt update
    pub fn private_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.private.get_mut(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> ConnectionId {
        ConnectionId::new()
    }

    #[test]
    fn test_ids_strictly_increase() {
        let mut log = MessageLog::new();
        let a = conn();
        let m1 = log.create_public("alice", a, RoomName::new("general"), "one".into());
        let m2 = log.create_private("alice", a, conn(), "two".into());
        let m3 = log.create_public("alice", a, RoomName::new("general"), "three".into());
        assert!(m1.id < m2.id);
        assert!(m2.id < m3.id);
    }

    #[test]
    fn test_sender_has_read_own_message() {
        let mut log = MessageLog::new();
        let a = conn();
        let public = log.create_public("alice", a, RoomName::new("general"), "hi".into());
        assert_eq!(public.read_by, vec![a]);

        let private = log.create_private("alice", a, conn(), "psst".into());
        assert_eq!(private.read_by, vec![a]);
    }

    #[test]
    fn test_mark_read_idempotent() {
        let mut log = MessageLog::new();
        let a = conn();
        let b = conn();
        let mut msg = log.create_public("alice", a, RoomName::new("general"), "hi".into());

        assert!(msg.mark_read_by(b));
        assert!(!msg.mark_read_by(b));
        assert_eq!(msg.read_by, vec![a, b]);
    }

    #[test]
    fn test_private_message_shape_and_index() {
        let mut log = MessageLog::new();
        let a = conn();
        let b = conn();
        let msg = log.create_private("alice", a, b, "psst".into());

        assert!(msg.is_private);
        assert_eq!(msg.room, None);
        assert_eq!(msg.recipient_id, Some(b));

        // Receipt lookup finds the same message by id
        let indexed = log.private_mut(msg.id).unwrap();
        assert_eq!(indexed.body, "psst");
        assert!(indexed.mark_read_by(b));
        assert_eq!(indexed.read_by, vec![a, b]);
    }

    #[test]
    fn test_public_wire_shape() {
        let mut log = MessageLog::new();
        let a = conn();
        let msg = log.create_public("alice", a, RoomName::new("general"), "hi".into());
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["room"], "general");
        assert_eq!(json["is_private"], false);
        assert_eq!(json["read_by"][0], serde_json::to_value(a).unwrap());
        // recipient_id is a private-only field
        assert!(json.get("recipient_id").is_none());
    }

    #[test]
    fn test_private_wire_shape() {
        let mut log = MessageLog::new();
        let msg = log.create_private("alice", conn(), conn(), "psst".into());
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["room"], serde_json::Value::Null);
        assert_eq!(json["is_private"], true);
        assert!(json.get("recipient_id").is_some());
    }

    #[test]
    fn test_system_notice_carries_no_id() {
        let payload = MessagePayload::from(SystemNotice::new("Welcome!"));
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["username"], SYSTEM_AUTHOR);
        assert_eq!(json["body"], "Welcome!");
        assert!(json.get("id").is_none());
        assert!(json.get("read_by").is_none());
    }
}
