//! Connection registry
//!
//! Maps live connection ids to their sessions. The registry is the sole
//! owner of `Session` records; rooms refer to members by id only, so a
//! room never outlives or destroys a session.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::protocol::ServerMessage;
use crate::session::Session;
use crate::types::{ConnectionId, RoomName};

/// Registry of all connected sessions
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<ConnectionId, Session>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection with no username or room bound yet
    ///
    /// Returns false if the id is already registered; the existing session
    /// is left untouched. Duplicate registration is a programming error on
    /// the transport side, and reporting it is the coordinator's job.
    pub fn register(&mut self, id: ConnectionId, sender: mpsc::Sender<ServerMessage>) -> bool {
        if self.sessions.contains_key(&id) {
            return false;
        }
        self.sessions.insert(id, Session::new(id, sender));
        true
    }

    /// Bind username and room on an existing session (overwrites both)
    ///
    /// Returns false if the connection is unknown. Idempotent per call.
    pub fn bind(&mut self, id: ConnectionId, username: String, room: RoomName) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.bind(username, room);
                true
            }
            None => false,
        }
    }

    /// Look up a session by connection id
    pub fn lookup(&self, id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Check if a connection id is registered
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Remove a session at disconnect
    ///
    /// Returns the removed session so the caller can run room cleanup;
    /// `None` if the id was never registered or already removed
    /// (unregister is idempotent).
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> mpsc::Sender<ServerMessage> {
        mpsc::channel(32).0
    }

    #[tokio::test]
    async fn test_register_lookup_unregister() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();

        assert!(registry.register(id, channel()));
        assert_eq!(registry.len(), 1);

        let session = registry.lookup(id).unwrap();
        assert_eq!(session.id, id);
        assert!(session.current_room.is_none());

        let removed = registry.unregister(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(registry.is_empty());
        assert!(registry.lookup(id).is_none());
    }

    #[tokio::test]
    async fn test_duplicate_register_refused() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();

        assert!(registry.register(id, channel()));
        assert!(!registry.register(id, channel()));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_bind_sets_identity_and_room() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        registry.register(id, channel());

        assert!(registry.bind(id, "Alice".into(), RoomName::new("general")));
        let session = registry.lookup(id).unwrap();
        assert_eq!(session.username.as_deref(), Some("Alice"));
        assert_eq!(session.current_room, Some(RoomName::new("general")));

        // Rebinding overwrites the room
        assert!(registry.bind(id, "Alice".into(), RoomName::new("sports")));
        let session = registry.lookup(id).unwrap();
        assert_eq!(session.current_room, Some(RoomName::new("sports")));
    }

    #[tokio::test]
    async fn test_bind_unknown_connection() {
        let mut registry = ConnectionRegistry::new();
        assert!(!registry.bind(ConnectionId::new(), "Ghost".into(), RoomName::new("general")));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        registry.register(id, channel());

        assert!(registry.unregister(id).is_some());
        assert!(registry.unregister(id).is_none());
    }
}
