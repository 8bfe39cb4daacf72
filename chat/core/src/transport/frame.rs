//! Frame Protocol
//!
//! Wire format for the chat stream: one JSON record per WebSocket text
//! message.
//!
//! # Frame Format
//!
//! ```text
//! { "type": "user_message" | "assistant_delta" | "assistant_done" | "system" | "error",
//!   "payload": "<text>" }
//! ```
//!
//! - `assistant_delta`: a fragment to append to the current assistant turn
//! - `assistant_done`: end of the assistant turn; payload is empty or a final fragment
//! - `user_message` / `system`: one-shot, fully formed content
//! - `error`: human-readable diagnostic, never a chat message
//!
//! # Security
//!
//! - Maximum frame size is enforced before parsing
//! - Unknown `type` values and missing `payload` are rejected

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Maximum frame size (1 MB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame type discriminator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// A complete user message (echoed by the server)
    UserMessage,
    /// A fragment of an assistant response
    AssistantDelta,
    /// End of an assistant response
    AssistantDone,
    /// A server notice
    System,
    /// A server diagnostic
    Error,
}

/// A decoded wire frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame type
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Frame payload
    pub payload: String,
}

impl Frame {
    /// Create a frame
    pub fn new(kind: FrameKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Outbound frame carrying user input
    pub fn user_message(text: impl Into<String>) -> Self {
        Self::new(FrameKind::UserMessage, text)
    }

    /// Fragment of an assistant turn
    pub fn assistant_delta(fragment: impl Into<String>) -> Self {
        Self::new(FrameKind::AssistantDelta, fragment)
    }

    /// End of an assistant turn
    pub fn assistant_done(fragment: impl Into<String>) -> Self {
        Self::new(FrameKind::AssistantDone, fragment)
    }

    /// Server notice
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(FrameKind::System, text)
    }

    /// Server diagnostic
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(FrameKind::Error, text)
    }
}

/// Encode a frame as JSON text
///
/// # Errors
///
/// Returns `ChatError::MalformedFrame` if the encoded frame exceeds
/// `MAX_FRAME_SIZE`.
pub fn encode(frame: &Frame) -> Result<String, ChatError> {
    let json =
        serde_json::to_string(frame).map_err(|e| ChatError::MalformedFrame(e.to_string()))?;

    if json.len() > MAX_FRAME_SIZE {
        return Err(ChatError::MalformedFrame(format!(
            "Frame too large: {} bytes (max: {})",
            json.len(),
            MAX_FRAME_SIZE
        )));
    }

    Ok(json)
}

/// Decode JSON text into a frame
///
/// # Errors
///
/// Returns `ChatError::MalformedFrame` for oversized input, invalid JSON,
/// an unknown `type`, or a missing `payload`.
pub fn decode(raw: &str) -> Result<Frame, ChatError> {
    if raw.len() > MAX_FRAME_SIZE {
        return Err(ChatError::MalformedFrame(format!(
            "Frame size {} exceeds maximum {MAX_FRAME_SIZE}",
            raw.len()
        )));
    }

    serde_json::from_str(raw).map_err(|e| ChatError::MalformedFrame(e.to_string()))
}
