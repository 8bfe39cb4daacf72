//! Connection Manager
//!
//! Owns the single logical channel to the chat backend: opening it,
//! authenticating, reconnecting with backoff after failures, and closing it
//! on request. Callers see the channel only through `ConnectionEvent`s and
//! the `send` entry point; transport failures never surface as errors.
//!
//! # State machine
//!
//! ```text
//! Disconnected -> Connecting -> Authenticating -> Open
//!                     ^                             |
//!                     |    (failure in any of the   v
//!                     +------ three live states) Reconnecting
//!
//! any state --close()--> Closed (terminal)
//! ```

pub mod backoff;
pub mod manager;

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::outbound::DEFAULT_QUEUE_CAPACITY;
use crate::transport::frame::Frame;

pub use backoff::{Backoff, ReconnectPolicy};
pub use manager::ConnectionManager;

/// Default time allowed for the transport to connect
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for the server to acknowledge authentication
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of the logical channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Never opened
    Disconnected,
    /// Transport connection in progress
    Connecting,
    /// Connected, waiting for the server to accept the credential
    Authenticating,
    /// Frames flow both ways
    Open,
    /// Waiting out the backoff delay before the next attempt
    Reconnecting,
    /// Closed by the caller; terminal
    Closed,
}

impl ConnectionState {
    /// Whether the channel is attempting or holding a connection
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Authenticating | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Authenticating => "Authenticating",
            Self::Open => "Open",
            Self::Reconnecting => "Reconnecting",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// What the connection manager reports to its owner
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The channel entered a new state
    StateChanged(ConnectionState),
    /// A well-formed frame arrived while `Open`
    FrameReceived(Frame),
    /// A user message was handed to the transport but could not be written
    SendFailed {
        /// The text that was lost
        text: String,
        /// Transport-reported reason
        reason: String,
    },
}

/// Connection manager tuning
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Delays between reconnection attempts
    pub reconnect: ReconnectPolicy,
    /// Bound on the transport connect step
    pub connect_timeout: Duration,
    /// Bound on waiting for the authentication acknowledgement
    pub auth_timeout: Duration,
    /// Wait for a first server frame before treating the channel as open
    pub require_ack: bool,
    /// Outbound queue capacity
    pub queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            require_ack: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
