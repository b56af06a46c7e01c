//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake,
//! event parsing, and bidirectional communication with the ChatServer.
//! The handler owns no chat state. It allocates the connection id and
//! translates wire events into actor commands.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::server::ServerCommand;
use crate::types::ConnectionId;

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, registers the connection with the
/// ChatServer, issues the client its connection id, and manages the
/// connection lifecycle until either side closes.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Allocate connection ID
    let connection_id = ConnectionId::new();
    info!("Connection {} accepted from {}", connection_id, peer_addr);

    // Create channel for server -> client events
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(32);

    // Register with ChatServer. Every exit past this point must reach a
    // disconnect send, or the registry entry outlives the connection.
    if cmd_tx
        .send(ServerCommand::Connect {
            connection_id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register connection {} - server closed", connection_id);
        return Err(AppError::ChannelSend);
    }

    // Issue the connection id so the client can recognize itself in member
    // lists and address private messages. The connection is registered by
    // now: a failed first write must unregister before bailing out.
    let greeting = async {
        let json = serde_json::to_string(&ServerMessage::Connected { connection_id })?;
        ws_sender.send(Message::Text(json.into())).await?;
        Ok::<(), AppError>(())
    }
    .await;
    if let Err(e) = greeting {
        let _ = cmd_tx
            .send(ServerCommand::Disconnect { connection_id })
            .await;
        return Err(e);
    }

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (WebSocket -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            let cmd = client_message_to_command(connection_id, client_msg);
                            if cmd_tx_read.send(cmd).await.is_err() {
                                debug!("Server closed, ending read task for {}", connection_id);
                                break;
                            }
                        }
                        Err(e) => {
                            // Malformed frames are dropped, not fatal
                            warn!("Invalid JSON from {}: {}", connection_id, e);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", connection_id);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Keep-alive is handled by tungstenite itself
                }
                Ok(_) => {
                    // Binary or other frame types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", connection_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", connection_id);
    });

    // Spawn write task (ServerMessage -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for connection");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", connection_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", connection_id);
        }
    }

    // Send disconnect command exactly once per connection
    let _ = cmd_tx
        .send(ServerCommand::Disconnect { connection_id })
        .await;

    info!("Connection {} closed", connection_id);

    Ok(())
}

/// Convert a ClientMessage to a ServerCommand
fn client_message_to_command(connection_id: ConnectionId, msg: ClientMessage) -> ServerCommand {
    match msg {
        ClientMessage::Join { username, room } => ServerCommand::Join {
            connection_id,
            username,
            room,
        },
        ClientMessage::Chat { body } => ServerCommand::Chat { connection_id, body },
        ClientMessage::Typing => ServerCommand::Typing { connection_id },
        ClientMessage::StopTyping => ServerCommand::StopTyping { connection_id },
        ClientMessage::MessageRead { message_id, room } => ServerCommand::MessageRead {
            connection_id,
            message_id,
            room,
        },
        ClientMessage::PrivateMessage { recipient_id, body } => ServerCommand::PrivateMessage {
            connection_id,
            recipient_id,
            body,
        },
    }
}
