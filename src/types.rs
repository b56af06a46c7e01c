//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based identifier for one live connection
//! - `MessageId`: monotonic message identifier
//! - `RoomName`: client-chosen room key

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 minted at accept time. Stable for the connection's
/// lifetime; implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier (newtype pattern)
///
/// Backed by a process-scoped monotonic counter rather than a timestamp,
/// so ids never collide even when several messages are created within the
/// same millisecond. Ordering follows creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room name (client-chosen, used verbatim as the store key)
///
/// Rooms are identified by whatever name the joining client typed;
/// no normalization and no uniqueness rules beyond exact match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomName(pub String);

impl RoomName {
    /// Create a RoomName from anything string-like
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// View the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
