//! Error Types
//!
//! Errors surfaced by the chat session core. Transport failures are not part
//! of the caller-facing surface: the connection manager recovers from them by
//! reconnecting and reports them only as `StateChanged(Reconnecting)` events.

use std::fmt;

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors returned by chat session operations
#[derive(Debug, Error)]
pub enum ChatError {
    /// `open` was called on a session that is no longer `Disconnected`
    #[error("Session already opened (state: {state})")]
    AlreadyOpen {
        /// State the session was in when `open` was attempted
        state: ConnectionState,
    },

    /// An inbound frame could not be parsed into a chat frame
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The outbound queue is full; the caller decides whether to retry or drop
    #[error("Outbound queue full ({capacity} pending messages)")]
    Backpressure {
        /// Queue capacity that was reached
        capacity: usize,
    },

    /// The session has been closed
    #[error("Session is closed")]
    NotConnected,

    /// The configured base URL cannot be turned into a stream endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Failure reported by a transport
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors produced by a transport connection attempt
///
/// These never escape `send`; the connection manager turns them into a
/// reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection to the peer could not be established
    ConnectionFailed(String),
    /// The peer closed the connection
    ConnectionClosed,
    /// A frame could not be written
    SendFailed(String),
    /// The peer did not acknowledge authentication in time
    AuthenticationTimeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed(msg) => write!(f, "Connection failed: {msg}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::SendFailed(msg) => write!(f, "Send failed: {msg}"),
            Self::AuthenticationTimeout => write!(f, "Authentication timed out"),
        }
    }
}

impl std::error::Error for TransportError {}
