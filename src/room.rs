//! Room definitions and the room store
//!
//! A room is a named broadcast group holding its member list (join order)
//! and its message history. The store creates rooms lazily on first join
//! and deletes them the moment the last member leaves; an empty room
//! never survives in the store.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::message::ChatMessage;
use crate::types::{ConnectionId, MessageId, RoomName};

/// A chat room: members in join order plus the stored message history
///
/// Members are connection ids; the sessions themselves are owned by the
/// connection registry.
#[derive(Debug)]
pub struct Room {
    /// Room name, also the store key
    pub name: RoomName,
    /// Member connection ids in join order
    members: Vec<ConnectionId>,
    /// Public messages sent to this room, in creation order
    history: Vec<ChatMessage>,
}

impl Room {
    /// Create an empty room
    fn new(name: RoomName) -> Self {
        Self {
            name,
            members: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Add a member, preserving join order
    ///
    /// Returns false if the connection is already a member (no duplicate
    /// membership).
    pub fn add_member(&mut self, id: ConnectionId) -> bool {
        if self.contains(id) {
            false
        } else {
            self.members.push(id);
            true
        }
    }

    /// Remove a member, returning the remaining member count
    pub fn remove_member(&mut self, id: ConnectionId) -> usize {
        self.members.retain(|member| *member != id);
        self.members.len()
    }

    /// Member connection ids in join order
    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    /// Stored history in creation order
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Check if a connection is a member of this room
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains(&id)
    }

    /// Number of members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Store of all live rooms, keyed by name
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<RoomName, Room>,
}

impl RoomStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the named room, creating it empty if it does not exist
    pub fn ensure_room(&mut self, name: &RoomName) -> &mut Room {
        self.rooms
            .entry(name.clone())
            .or_insert_with(|| Room::new(name.clone()))
    }

    /// Remove a member from the named room
    ///
    /// Returns the remaining member count. A count of 0 means the room was
    /// deleted as a side effect and there is no one left to broadcast to;
    /// an unknown room also reports 0.
    pub fn remove_member(&mut self, name: &RoomName, id: ConnectionId) -> usize {
        let Some(room) = self.rooms.get_mut(name) else {
            return 0;
        };

        let remaining = room.remove_member(id);
        if remaining == 0 {
            self.rooms.remove(name);
            debug!("Room {} deleted (empty)", name);
        }
        remaining
    }

    /// Member ids of the named room in join order, if it exists
    pub fn members_of(&self, name: &RoomName) -> Option<&[ConnectionId]> {
        self.rooms.get(name).map(Room::members)
    }

    /// Stored history of the named room, if it exists
    pub fn history_of(&self, name: &RoomName) -> Option<&[ChatMessage]> {
        self.rooms.get(name).map(Room::history)
    }

    /// Append a message to the named room's history
    ///
    /// A missing room is logged and the message dropped: the room can be
    /// deleted by a disconnect while a send for it is still in flight.
    pub fn append_message(&mut self, name: &RoomName, message: ChatMessage) {
        match self.rooms.get_mut(name) {
            Some(room) => room.history.push(message),
            None => warn!("Dropped message for missing room {}", name),
        }
    }

    /// Locate a message in the named room's history for a receipt update
    pub fn find_message_mut(
        &mut self,
        name: &RoomName,
        id: MessageId,
    ) -> Option<&mut ChatMessage> {
        self.rooms
            .get_mut(name)?
            .history
            .iter_mut()
            .find(|msg| msg.id == id)
    }

    /// Check if the named room exists
    pub fn contains_room(&self, name: &RoomName) -> bool {
        self.rooms.contains_key(name)
    }

    /// Number of live rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no rooms exist
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
