//! Transport Layer for the Chat Stream
//!
//! Separates the communication mechanism from session logic:
//! - [`frame`]: JSON wire frames and their codec
//! - [`endpoint`]: stream URL derivation and credential placement
//! - [`traits`]: the `Connector` seam and per-attempt links
//! - `websocket`: tokio-tungstenite connector (feature `websocket`)
//!
//! # Security
//!
//! - The bearer credential is sent only as a connection-establishment query
//!   parameter, never inside a frame
//! - Inbound frame size is bounded before parsing

pub mod endpoint;
pub mod frame;
pub mod traits;
#[cfg(feature = "websocket")]
pub mod websocket;

// Re-exports for convenience
pub use endpoint::{AuthToken, Endpoint, DEFAULT_STREAM_PATH};
pub use frame::{Frame, FrameKind, MAX_FRAME_SIZE};
pub use traits::{
    AttemptId, Connector, Outbox, TaggedEvent, TransportEvent, TransportEventSender,
    TransportLink, Unsent,
};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
