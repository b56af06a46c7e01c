//! Session struct definition
//!
//! The server-side record bound to one live connection: identity, current
//! room, and the outbound event channel.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::protocol::ServerMessage;
use crate::types::{ConnectionId, RoomName};

/// Per-connection session
///
/// Created at connect time with neither username nor room; both are bound
/// by the first join and rebound on every room switch. Destroyed at
/// disconnect. A session is a member of at most one room at a time.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Username (None until the first join)
    pub username: Option<String>,
    /// Room this session is currently a member of, if any
    pub current_room: Option<RoomName>,
    /// Server → Client event channel
    pub sender: mpsc::Sender<ServerMessage>,
}

impl Session {
    /// Create a new session with the given ID and sender channel
    pub fn new(id: ConnectionId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            username: None,
            current_room: None,
            sender,
        }
    }

    /// Deliver an event to this connection
    ///
    /// Fire-and-forget: never waits for channel capacity, so a slow client
    /// cannot stall the coordinator. A full or closed channel drops this
    /// one event for this one connection.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Bind identity and room membership (overwrites both)
    pub fn bind(&mut self, username: String, room: RoomName) {
        self.username = Some(username);
        self.current_room = Some(room);
    }

    /// Get the display name for this session
    ///
    /// Returns the username if bound, otherwise "Unknown".
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("Unknown")
    }

    /// Check whether a join has ever completed for this session
    pub fn has_username(&self) -> bool {
        self.username.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_starts_unbound() {
        let (tx, _rx) = mpsc::channel(32);
        let session = Session::new(ConnectionId::new(), tx);

        assert!(session.username.is_none());
        assert!(session.current_room.is_none());
        assert!(!session.has_username());
        assert_eq!(session.display_name(), "Unknown");
    }

    #[tokio::test]
    async fn test_bind_overwrites() {
        let (tx, _rx) = mpsc::channel(32);
        let mut session = Session::new(ConnectionId::new(), tx);

        session.bind("Alice".to_string(), RoomName::new("general"));
        assert_eq!(session.display_name(), "Alice");
        assert_eq!(session.current_room, Some(RoomName::new("general")));

        session.bind("Alice".to_string(), RoomName::new("sports"));
        assert_eq!(session.current_room, Some(RoomName::new("sports")));
    }

    #[tokio::test]
    async fn test_send_delivers() {
        let (tx, mut rx) = mpsc::channel(32);
        let session = Session::new(ConnectionId::new(), tx);

        session
            .send(ServerMessage::Typing { username: "alice".into() })
            .unwrap();

        match rx.try_recv() {
            Ok(ServerMessage::Typing { username }) => assert_eq!(username, "alice"),
            other => panic!("Unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_never_blocks_on_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let session = Session::new(ConnectionId::new(), tx);

        session
            .send(ServerMessage::Typing { username: "a".into() })
            .unwrap();
        let err = session
            .send(ServerMessage::Typing { username: "b".into() })
            .unwrap_err();
        assert!(matches!(err, SendError::ChannelFull));
    }

    #[tokio::test]
    async fn test_send_on_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let session = Session::new(ConnectionId::new(), tx);

        let err = session
            .send(ServerMessage::Typing { username: "a".into() })
            .unwrap_err();
        assert!(matches!(err, SendError::ChannelClosed));
    }
}
