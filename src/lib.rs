//! Multi-Room WebSocket Chat Server Library
//!
//! A room-scoped chat server built with tokio-tungstenite using the
//! Actor pattern for state management.
//!
//! # Features
//! - WebSocket connection handling
//! - Named rooms created on first join
//! - Room-wide chat with per-room history replay
//! - Private messages between connections
//! - Read receipts on public and private messages
//! - Typing indicators
//! - Presence (live member lists, join/leave notices)
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor managing all state
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use roomcast::{ChatServer, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx));
//!     }
//! }
//! ```

pub mod error;
pub mod handler;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{ChatMessage, MessagePayload, SystemNotice};
pub use protocol::{ClientMessage, RoomUser, ServerMessage};
pub use registry::ConnectionRegistry;
pub use room::{Room, RoomStore};
pub use server::{ChatServer, ServerCommand};
pub use session::Session;
pub use types::{ConnectionId, MessageId, RoomName};
