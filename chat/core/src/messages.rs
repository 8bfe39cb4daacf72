//! Chat Messages
//!
//! The entries of a session log. A message is created either complete
//! (user and system turns) or streaming (assistant turns), and a streaming
//! message only ever grows at its end until it is marked complete.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message identifier, unique within a session and never reused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg_{}", self.0)
    }
}

/// Per-session source of message IDs
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    next: u64,
}

impl MessageIdGenerator {
    /// Create a generator starting at `msg_0`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next ID
    pub fn next_id(&mut self) -> MessageId {
        let id = MessageId(self.next);
        self.next += 1;
        id
    }
}

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The human on this end of the channel
    User,
    /// The AI companion
    Assistant,
    /// Server-side notices (greetings, status lines)
    System,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Assistant => write!(f, "Assistant"),
            Self::System => write!(f, "System"),
        }
    }
}

/// Whether a message can still grow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Content is still arriving
    Streaming,
    /// Content is final
    Complete,
}

/// A message in the session log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message (fixed at creation)
    pub speaker: Speaker,
    /// Message content
    pub content: String,
    /// Streaming or complete
    pub status: MessageStatus,
    /// When the message was created
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a complete message
    #[must_use]
    pub fn complete(id: MessageId, speaker: Speaker, content: String) -> Self {
        Self {
            id,
            speaker,
            content,
            status: MessageStatus::Complete,
            created_at: Utc::now(),
        }
    }

    /// Create a streaming message seeded with its first fragment
    #[must_use]
    pub fn streaming(id: MessageId, speaker: Speaker, fragment: &str) -> Self {
        Self {
            id,
            speaker,
            content: fragment.to_string(),
            status: MessageStatus::Streaming,
            created_at: Utc::now(),
        }
    }

    /// Append a fragment to a streaming message
    ///
    /// Returns `false` (and leaves the content untouched) once the message
    /// is complete.
    pub fn append(&mut self, fragment: &str) -> bool {
        if self.status == MessageStatus::Complete {
            return false;
        }
        self.content.push_str(fragment);
        true
    }

    /// Mark the message complete; its content is frozen afterwards
    pub fn finish(&mut self) {
        self.status = MessageStatus::Complete;
    }

    /// Check whether content may still be appended
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }
}
