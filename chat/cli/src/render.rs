//! Transcript rendering
//!
//! Turns successive log snapshots into append-only terminal output. Only the
//! text added since the previous snapshot is written, so a streaming reply
//! grows in place on its line.

use std::collections::HashMap;
use std::fmt::Write;

use chat_core::{Message, MessageId};

#[derive(Clone, Copy, Debug)]
struct Shown {
    bytes: usize,
    finished: bool,
}

/// Incremental snapshot-to-text renderer
#[derive(Debug, Default)]
pub struct TranscriptRenderer {
    shown: HashMap<MessageId, Shown>,
    /// Message whose line is still open (no trailing newline yet)
    open_line: Option<MessageId>,
}

impl TranscriptRenderer {
    /// Text to append for the new snapshot
    pub fn render(&mut self, messages: &[Message]) -> String {
        let mut out = String::new();

        for message in messages {
            let previous = self.shown.get(&message.id).copied();
            if previous.is_some_and(|s| s.finished) {
                continue;
            }

            let start = previous.map_or(0, |s| s.bytes);
            let added = message.content.get(start..).unwrap_or_default();

            match previous {
                None => self.start_line(&mut out, message, ""),
                Some(_) if !added.is_empty() && self.open_line != Some(message.id) => {
                    self.start_line(&mut out, message, " (cont.)");
                }
                Some(_) => {}
            }
            out.push_str(added);

            let finished = !message.is_streaming();
            if finished && self.open_line == Some(message.id) {
                out.push('\n');
                self.open_line = None;
            }

            self.shown.insert(
                message.id,
                Shown {
                    bytes: message.content.len(),
                    finished,
                },
            );
        }

        out
    }

    fn start_line(&mut self, out: &mut String, message: &Message, suffix: &str) {
        if self.open_line.is_some() {
            out.push('\n');
        }
        let _ = write!(out, "{}{suffix}: ", message.speaker);
        self.open_line = Some(message.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::Speaker;
    use pretty_assertions::assert_eq;

    fn streaming(id: u64, text: &str) -> Message {
        Message::streaming(MessageId(id), Speaker::Assistant, text)
    }

    fn complete(id: u64, speaker: Speaker, text: &str) -> Message {
        Message::complete(MessageId(id), speaker, text.to_string())
    }

    #[test]
    fn test_streaming_reply_grows_in_place() {
        let mut renderer = TranscriptRenderer::default();
        let user = complete(0, Speaker::User, "hi");

        let mut out = renderer.render(&[user.clone()]);
        out += &renderer.render(&[user.clone(), streaming(1, "Hel")]);
        out += &renderer.render(&[user.clone(), streaming(1, "Hello")]);
        out += &renderer.render(&[user, complete(1, Speaker::Assistant, "Hello!")]);

        assert_eq!(out, "User: hi\nAssistant: Hello!\n");
    }

    #[test]
    fn test_unchanged_snapshot_renders_nothing() {
        let mut renderer = TranscriptRenderer::default();
        let log = vec![complete(0, Speaker::System, "Connected. Type a message.")];
        renderer.render(&log);
        assert_eq!(renderer.render(&log), "");
    }

    #[test]
    fn test_interleaved_message_breaks_open_line() {
        let mut renderer = TranscriptRenderer::default();

        let mut out = renderer.render(&[streaming(0, "Thinking")]);
        out += &renderer.render(&[streaming(0, "Thinking"), complete(1, Speaker::User, "also")]);
        out += &renderer.render(&[
            complete(0, Speaker::Assistant, "Thinking..."),
            complete(1, Speaker::User, "also"),
        ]);

        assert_eq!(out, "Assistant: Thinking\nUser: also\nAssistant (cont.): ...\n");
    }

    #[test]
    fn test_sealed_without_new_text_adds_nothing() {
        let mut renderer = TranscriptRenderer::default();
        let mut out = renderer.render(&[streaming(0, "Hel")]);
        out += &renderer.render(&[
            complete(0, Speaker::Assistant, "Hel"),
            streaming(1, "Hi"),
        ]);

        assert_eq!(out, "Assistant: Hel\nAssistant: Hi");
    }
}
