//! Chat Core - Headless Streaming Chat Session
//!
//! The client side of a live chat with an AI companion: one long-lived
//! authenticated channel to the backend, user input accepted at any time
//! (including while disconnected), assistant replies assembled from
//! incremental fragments, and transparent recovery from transport failures.
//! No UI code lives here; any surface renders from snapshots.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         UI Surface                            │
//! │        send(text)              snapshot() / subscribe()       │
//! └───────────┬──────────────────────────────────▲───────────────┘
//!             │                                  │
//! ┌───────────┼──────────────────────────────────┼───────────────┐
//! │           │            ChatSession           │               │
//! │  ┌────────▼──────────┐  events  ┌────────────┴────────────┐  │
//! │  │ ConnectionManager ├─────────►│ driver: Assembler+Store │  │
//! │  │  + OutboundQueue  │          └─────────────────────────┘  │
//! │  └────────┬──────────┘                                        │
//! └───────────┼───────────────────────────────────────────────────┘
//!             │ Connector / TransportLink (per attempt)
//!       ┌─────▼─────┐
//!       │ WebSocket │
//!       └───────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatSession`]: the object a UI holds
//! - [`ConnectionManager`]: channel lifecycle, backoff and the outbound queue
//! - [`MessageAssembler`]: reduces frames into the message log
//! - [`SessionStore`]: snapshots and change notification
//! - [`Frame`]: the JSON wire unit
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use chat_core::{load_config, AuthToken, ChatSession, WebSocketConnector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let session = ChatSession::new(
//!         config.connection.clone(),
//!         Arc::new(WebSocketConnector::new()),
//!         AuthToken::new("secret"),
//!     );
//!     session.subscribe(|snapshot| println!("{} messages", snapshot.len()));
//!     session.open(config.endpoint()?)?;
//!     session.send("hi")?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`transport`]: wire frames, endpoint derivation, the `Connector` seam
//! - [`outbound`]: bounded queue for input typed while not connected
//! - [`connection`]: connection state machine and reconnect loop
//! - [`assembler`]: fragment assembly
//! - [`store`]: session log
//! - [`session`]: the facade binding it all
//! - [`history`]: persistence hook for completed messages
//! - [`config`]: TOML/env configuration

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assembler;
pub mod config;
pub mod connection;
pub mod error;
pub mod history;
pub mod messages;
pub mod outbound;
pub mod session;
pub mod store;
pub mod transport;

// Re-exports for convenience
pub use assembler::{MessageAssembler, Reduction};
pub use connection::{
    Backoff, ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState,
    ReconnectPolicy,
};
pub use error::{ChatError, TransportError};
pub use history::{HistoryError, HistorySink, JsonlHistory, NoopHistory};
pub use messages::{Message, MessageId, MessageStatus, Speaker};
pub use outbound::{OutboundQueue, DEFAULT_QUEUE_CAPACITY};
pub use session::{ChatSession, SessionNotice};
pub use store::{SessionStore, Snapshot, SubscriptionId};
pub use transport::{
    AttemptId, AuthToken, Connector, Endpoint, Frame, FrameKind, Outbox, TransportEvent,
    TransportEventSender, TransportLink, Unsent,
};

#[cfg(feature = "websocket")]
pub use transport::WebSocketConnector;

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ChatConfig, ChatToml, ConfigError,
    ConfigOverrides, ConfigSource,
};
