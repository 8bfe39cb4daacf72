//! Message Assembler
//!
//! Reduces decoded frames into the session log. Assistant fragments of one
//! turn collapse into a single growing message; user and system frames become
//! complete messages immediately.
//!
//! # Turn boundaries
//!
//! A fragment extends the trailing message only while that message is the
//! open assistant turn. The turn closes when:
//! - `assistant_done` arrives
//! - any other message is appended behind it
//! - the connection drops (`interrupt`), since a resumed stream cannot be
//!   proven to belong to the interrupted turn
//!
//! A fragment arriving with no open turn starts a new assistant message. Any
//! abandoned streaming message is finalised at that point, so the log never
//! holds more than one streaming message.

use crate::messages::{Message, MessageId, MessageIdGenerator, Speaker};
use crate::transport::frame::{Frame, FrameKind};

/// What a reduction did to the log
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reduction {
    /// Whether the log changed at all
    pub changed: bool,
    /// Messages that became `Complete` during this reduction, in log order
    pub completed: Vec<MessageId>,
}

impl Reduction {
    fn unchanged() -> Self {
        Self::default()
    }

    fn changed() -> Self {
        Self {
            changed: true,
            completed: Vec::new(),
        }
    }
}

/// Single-writer reducer from frames to log mutations
#[derive(Debug, Default)]
pub struct MessageAssembler {
    ids: MessageIdGenerator,
    /// The assistant message currently accepting fragments
    open_turn: Option<MessageId>,
}

impl MessageAssembler {
    /// Create an assembler for a fresh session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one frame to the log
    pub fn reduce(&mut self, log: &mut Vec<Message>, frame: &Frame) -> Reduction {
        match frame.kind {
            FrameKind::UserMessage => self.push_complete(log, Speaker::User, &frame.payload),
            FrameKind::System => self.push_complete(log, Speaker::System, &frame.payload),
            FrameKind::AssistantDelta => self.apply_delta(log, &frame.payload),
            FrameKind::AssistantDone => self.apply_done(log, &frame.payload),
            FrameKind::Error => Reduction::unchanged(),
        }
    }

    /// Close the open assistant turn without completing it
    ///
    /// Called when the connection leaves `Open`. The partial message stays in
    /// the log untouched; later fragments start a new message.
    pub fn interrupt(&mut self) {
        if let Some(id) = self.open_turn.take() {
            tracing::debug!(message_id = %id, "Assistant turn interrupted");
        }
    }

    /// The assistant message currently accepting fragments
    #[must_use]
    pub fn open_turn(&self) -> Option<MessageId> {
        self.open_turn
    }

    fn push_complete(&mut self, log: &mut Vec<Message>, speaker: Speaker, text: &str) -> Reduction {
        let id = self.ids.next_id();
        log.push(Message::complete(id, speaker, text.to_string()));
        Reduction {
            changed: true,
            completed: vec![id],
        }
    }

    fn apply_delta(&mut self, log: &mut Vec<Message>, fragment: &str) -> Reduction {
        if let Some(msg) = self.open_message(log) {
            msg.append(fragment);
            return Reduction::changed();
        }

        let mut reduction = Reduction::changed();

        // Finalise an abandoned turn before opening a new one
        for msg in log.iter_mut().filter(|m| m.is_streaming()) {
            msg.finish();
            reduction.completed.push(msg.id);
            tracing::debug!(message_id = %msg.id, "Sealed abandoned assistant turn");
        }

        let id = self.ids.next_id();
        log.push(Message::streaming(id, Speaker::Assistant, fragment));
        self.open_turn = Some(id);
        reduction
    }

    fn apply_done(&mut self, log: &mut Vec<Message>, fragment: &str) -> Reduction {
        let Some(msg) = self.open_message(log) else {
            tracing::trace!("assistant_done with no open turn ignored");
            return Reduction::unchanged();
        };

        msg.append(fragment);
        msg.finish();
        let id = msg.id;
        self.open_turn = None;

        Reduction {
            changed: true,
            completed: vec![id],
        }
    }

    /// The trailing message, if it is the open streaming assistant turn
    fn open_message<'a>(&self, log: &'a mut [Message]) -> Option<&'a mut Message> {
        let open = self.open_turn?;
        log.last_mut()
            .filter(|m| m.id == open && m.speaker == Speaker::Assistant && m.is_streaming())
    }
}
