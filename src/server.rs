//! ChatServer actor implementation
//!
//! The central actor that owns all chat state: the connection registry, the
//! room store, and the message log. Uses the Actor pattern with mpsc channels
//! for message passing. Commands arrive on one channel and are applied one
//! at a time, so no other synchronization is needed.
//!
//! Every state transition is synchronous and in-memory; outbound delivery is
//! fire-and-forget through per-connection channels, so a slow client can
//! never stall the actor or its fan-out to other clients.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::message::{MessageLog, SystemNotice};
use crate::protocol::{RoomUser, ServerMessage};
use crate::registry::ConnectionRegistry;
use crate::room::RoomStore;
use crate::types::{ConnectionId, MessageId, RoomName};

/// Commands sent from connection handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted
    Connect {
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Connection closed (terminal for this id)
    Disconnect {
        connection_id: ConnectionId,
    },
    /// Join a room, switching out of the current one if any
    Join {
        connection_id: ConnectionId,
        username: String,
        room: RoomName,
    },
    /// Send a chat message to the current room
    Chat {
        connection_id: ConnectionId,
        body: String,
    },
    /// Started typing
    Typing {
        connection_id: ConnectionId,
    },
    /// Stopped typing
    StopTyping {
        connection_id: ConnectionId,
    },
    /// Acknowledge reading a message
    MessageRead {
        connection_id: ConnectionId,
        message_id: MessageId,
        room: Option<RoomName>,
    },
    /// Send a private message to another connection
    PrivateMessage {
        connection_id: ConnectionId,
        recipient_id: ConnectionId,
        body: String,
    },
}

/// The main ChatServer actor
///
/// Owns the connection registry, the room store, and the message log, and
/// processes commands from connection handlers strictly in arrival order.
pub struct ChatServer {
    /// All connected sessions
    registry: ConnectionRegistry,
    /// All live rooms with their members and histories
    rooms: RoomStore,
    /// Message factory and private-message index
    log: MessageLog,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomStore::new(),
            log: MessageLog::new(),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are
    /// dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { connection_id, sender } => {
                self.handle_connect(connection_id, sender);
            }
            ServerCommand::Disconnect { connection_id } => {
                self.handle_disconnect(connection_id);
            }
            ServerCommand::Join { connection_id, username, room } => {
                self.handle_join(connection_id, username, room);
            }
            ServerCommand::Chat { connection_id, body } => {
                self.handle_chat(connection_id, body);
            }
            ServerCommand::Typing { connection_id } => {
                self.handle_typing(connection_id);
            }
            ServerCommand::StopTyping { connection_id } => {
                self.handle_stop_typing(connection_id);
            }
            ServerCommand::MessageRead { connection_id, message_id, room } => {
                self.handle_message_read(connection_id, message_id, room);
            }
            ServerCommand::PrivateMessage { connection_id, recipient_id, body } => {
                self.handle_private_message(connection_id, recipient_id, body);
            }
        }
    }

    /// Handle a new connection
    ///
    /// A duplicate id means the transport broke its uniqueness guarantee;
    /// the stale session is torn down through the normal disconnect path
    /// before the new one registers, so shared state never forks.
    fn handle_connect(&mut self, connection_id: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        if self.registry.contains(connection_id) {
            error!(
                "Duplicate registration for {}, tearing down the stale session",
                connection_id
            );
            self.handle_disconnect(connection_id);
        }

        self.registry.register(connection_id, sender);
        info!("Connection {} registered", connection_id);
        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.registry.len(),
            self.rooms.len()
        );
    }

    /// Handle a disconnect (terminal)
    ///
    /// Leaves the current room if any, tells the remaining members who left,
    /// then unregisters. Safe to call more than once for the same id.
    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        let Some(session) = self.registry.lookup(connection_id) else {
            debug!("Disconnect for unknown connection {}", connection_id);
            return;
        };
        let username = session.display_name().to_string();
        let room = session.current_room.clone();

        if let Some(room) = room {
            let remaining = self.rooms.remove_member(&room, connection_id);
            // Departure notice and refreshed member list, in that order,
            // but only if anyone is left to hear it
            if remaining > 0 {
                self.notify_room(&room, format!("{} has left the chat.", username), None);
                self.broadcast_room_users(&room);
            }
        }

        self.registry.unregister(connection_id);
        info!("Connection {} disconnected ({})", connection_id, username);
        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.registry.len(),
            self.rooms.len()
        );
    }

    /// Handle a join
    ///
    /// A session is a member of at most one room, so joining while already
    /// in a room leaves the old one first. The joiner alone gets the welcome
    /// notice and the history replay, the rest of the room gets the join
    /// notice, and the whole room gets the refreshed member list.
    fn handle_join(&mut self, connection_id: ConnectionId, username: String, room: RoomName) {
        if !self.registry.contains(connection_id) {
            warn!("Join from unregistered connection {}", connection_id);
            return;
        }

        let prior_room = self
            .registry
            .lookup(connection_id)
            .and_then(|session| session.current_room.clone());
        if let Some(prior_room) = prior_room {
            self.leave_room(connection_id, &prior_room);
        }

        self.registry.bind(connection_id, username.clone(), room.clone());
        self.rooms.ensure_room(&room).add_member(connection_id);

        self.notify(connection_id, format!("Welcome to the {} chat room!", room));
        self.notify_room(
            &room,
            format!("{} has joined the chat.", username),
            Some(connection_id),
        );
        self.broadcast_room_users(&room);

        // History replay goes to the joiner only and replaces their view
        let messages = self
            .rooms
            .history_of(&room)
            .map(|history| history.to_vec())
            .unwrap_or_default();
        self.deliver(connection_id, ServerMessage::RoomHistory { messages });

        info!("{} ({}) joined room {}", username, connection_id, room);
    }

    /// Handle a chat message to the sender's current room
    fn handle_chat(&mut self, connection_id: ConnectionId, body: String) {
        let Some(session) = self.registry.lookup(connection_id) else {
            debug!("Chat from unregistered connection {}", connection_id);
            return;
        };
        // No-op until a join has completed
        let Some(room) = session.current_room.clone() else {
            debug!("Chat from {} outside any room", connection_id);
            return;
        };
        let author = session.display_name().to_string();

        let msg = self.log.create_public(&author, connection_id, room.clone(), body);
        info!("Message {} from {} in {}", msg.id, author, room);

        self.rooms.append_message(&room, msg.clone());
        self.broadcast_to_room(&room, ServerMessage::Message(msg.into()), None);
    }

    /// Handle a typing indicator
    ///
    /// Pure fan-out to the rest of the room; nothing is stored and nothing
    /// expires server-side.
    fn handle_typing(&self, connection_id: ConnectionId) {
        let Some(session) = self.registry.lookup(connection_id) else {
            return;
        };
        let Some(room) = session.current_room.clone() else {
            return;
        };
        let username = session.display_name().to_string();

        self.broadcast_to_room(&room, ServerMessage::Typing { username }, Some(connection_id));
    }

    /// Handle a stop-typing indicator (mirror of `handle_typing`)
    fn handle_stop_typing(&self, connection_id: ConnectionId) {
        let Some(session) = self.registry.lookup(connection_id) else {
            return;
        };
        let Some(room) = session.current_room.clone() else {
            return;
        };
        let username = session.display_name().to_string();

        self.broadcast_to_room(&room, ServerMessage::StopTyping { username }, Some(connection_id));
    }

    /// Handle a read receipt
    ///
    /// Looks for the message in the named room's history first, then in the
    /// private index (private messages carry no room). Already-read and
    /// unknown ids are no-ops. A grown receipt set fans out as one
    /// `message_updated` event: to the whole room for a public message, to
    /// the two parties for a private one.
    fn handle_message_read(
        &mut self,
        connection_id: ConnectionId,
        message_id: MessageId,
        room: Option<RoomName>,
    ) {
        let Some(session) = self.registry.lookup(connection_id) else {
            debug!("Read receipt from unregistered connection {}", connection_id);
            return;
        };
        // No-op until a join has completed
        if !session.has_username() {
            debug!("Read receipt from {} before any join", connection_id);
            return;
        }

        if let Some(room) = room {
            if let Some(msg) = self.rooms.find_message_mut(&room, message_id) {
                if msg.mark_read_by(connection_id) {
                    let updated = msg.clone();
                    info!("Message {} in {} read by {}", message_id, room, connection_id);
                    self.broadcast_to_room(&room, ServerMessage::MessageUpdated(updated), None);
                }
                return;
            }
        }

        if let Some(msg) = self.log.private_mut(message_id) {
            if msg.mark_read_by(connection_id) {
                let updated = msg.clone();
                info!("Private message {} read by {}", message_id, connection_id);
                self.deliver(updated.sender_id, ServerMessage::MessageUpdated(updated.clone()));
                if let Some(recipient_id) = updated.recipient_id {
                    self.deliver(recipient_id, ServerMessage::MessageUpdated(updated));
                }
            }
        }
        // Unknown id: nothing to do
    }

    /// Handle a private message
    ///
    /// Delivered to exactly two destinations, the recipient and the sender's
    /// own connection, so the sender's UI renders its outgoing copy through
    /// the same path as incoming messages. An unknown or never-joined
    /// recipient (or a sender who never joined and so has no author identity)
    /// bounces a notice back to the sender instead.
    fn handle_private_message(
        &mut self,
        connection_id: ConnectionId,
        recipient_id: ConnectionId,
        body: String,
    ) {
        let Some(sender) = self.registry.lookup(connection_id) else {
            warn!("Private message from unregistered connection {}", connection_id);
            return;
        };
        let author = sender.display_name().to_string();
        let sender_bound = sender.has_username();

        // Both ends must have joined; a bare connection has no author
        // identity and is not an addressable user yet
        let recipient_bound = self
            .registry
            .lookup(recipient_id)
            .is_some_and(|session| session.has_username());

        if !sender_bound || !recipient_bound {
            self.notify(
                connection_id,
                "Recipient not found or offline for private message.",
            );
            return;
        }

        let msg = self.log.create_private(&author, connection_id, recipient_id, body);
        info!(
            "Private message {} from {} to {}",
            msg.id, connection_id, recipient_id
        );

        self.deliver(recipient_id, ServerMessage::Message(msg.clone().into()));
        self.deliver(connection_id, ServerMessage::Message(msg.into()));
    }

    /// Helper: remove a connection from a room on a room switch
    ///
    /// Survivors get a refreshed member list; the departure notice is the
    /// disconnect path's concern, not this one's. If the room emptied, the
    /// store has already deleted it and there is no one to tell.
    fn leave_room(&mut self, connection_id: ConnectionId, room: &RoomName) {
        let remaining = self.rooms.remove_member(room, connection_id);
        if remaining > 0 {
            self.broadcast_room_users(room);
        }
    }

    /// Helper: deliver one event to one connection, fire-and-forget
    fn deliver(&self, connection_id: ConnectionId, msg: ServerMessage) {
        let Some(session) = self.registry.lookup(connection_id) else {
            debug!("Dropping event for unknown connection {}", connection_id);
            return;
        };
        if let Err(e) = session.send(msg) {
            debug!("Delivery to {} failed: {}", connection_id, e);
        }
    }

    /// Helper: deliver one event to every member of a room
    ///
    /// Works on a snapshot of the member list so dispatch never observes
    /// membership changes mid-iteration.
    fn broadcast_to_room(
        &self,
        room: &RoomName,
        msg: ServerMessage,
        exclude: Option<ConnectionId>,
    ) {
        let Some(members) = self.rooms.members_of(room).map(|m| m.to_vec()) else {
            return;
        };
        for member in members {
            if Some(member) == exclude {
                continue;
            }
            self.deliver(member, msg.clone());
        }
    }

    /// Helper: broadcast the room's member list, in join order, to the room
    fn broadcast_room_users(&self, room: &RoomName) {
        let Some(members) = self.rooms.members_of(room) else {
            return;
        };
        let users: Vec<RoomUser> = members
            .iter()
            .filter_map(|id| {
                self.registry.lookup(*id).map(|session| RoomUser {
                    id: *id,
                    username: session.display_name().to_string(),
                })
            })
            .collect();

        self.broadcast_to_room(room, ServerMessage::RoomUsers { users }, None);
    }

    /// Helper: system notice to a single connection
    fn notify(&self, connection_id: ConnectionId, body: impl Into<String>) {
        let notice = SystemNotice::new(body);
        self.deliver(connection_id, ServerMessage::Message(notice.into()));
    }

    /// Helper: system notice to a room, optionally excluding one member
    fn notify_room(&self, room: &RoomName, body: impl Into<String>, exclude: Option<ConnectionId>) {
        let notice = SystemNotice::new(body);
        self.broadcast_to_room(room, ServerMessage::Message(notice.into()), exclude);
    }
}
