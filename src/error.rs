//! Error types for the chat server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.
//!
//! User-facing conditions (unknown recipient, unknown message id, events
//! from unbound sessions) are deliberately not represented here: the
//! coordinator handles them as no-ops or system notices, never as errors.
//! Only transport-fatal failures surface as `AppError`.

use thiserror::Error;

/// Application-level errors
///
/// Everything here terminates the affected connection (or, for `ChannelSend`,
/// signals that the coordinator itself has shut down).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Command channel send error (fatal - coordinator is gone)
    #[error("Channel send error")]
    ChannelSend,
}

/// Per-connection delivery errors
///
/// Delivery is fire-and-forget: the coordinator logs these and moves on,
/// so one slow or dead client never stalls fan-out to the rest.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the connection's channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection's outbound buffer is full (client too slow)
    #[error("Channel full")]
    ChannelFull,
}
