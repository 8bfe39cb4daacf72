//! Outbound Queue
//!
//! Holds user input typed while the channel is not `Open`. Bounded so a long
//! outage cannot grow memory without limit; a full queue rejects instead of
//! dropping, and the caller decides what to tell the user.

use std::collections::VecDeque;

use crate::error::ChatError;

/// Default number of pending entries
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Bounded FIFO of raw text awaiting transmission
#[derive(Debug)]
pub struct OutboundQueue {
    entries: VecDeque<String>,
    capacity: usize,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` entries
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry behind everything already pending
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Backpressure` if the queue already holds
    /// `capacity` entries. The entry is not stored.
    pub fn enqueue(&mut self, text: String) -> Result<(), ChatError> {
        if self.entries.len() >= self.capacity {
            return Err(ChatError::Backpressure {
                capacity: self.capacity,
            });
        }
        self.entries.push_back(text);
        Ok(())
    }

    /// Drain entries in order through `accept`
    ///
    /// An entry is removed only after `accept` takes it. Stops at the first
    /// refusal, leaving that entry and everything behind it queued, and
    /// returns the refusal.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `accept`.
    pub fn flush<E, F>(&mut self, mut accept: F) -> Result<usize, E>
    where
        F: FnMut(&str) -> Result<(), E>,
    {
        let mut sent = 0;
        while let Some(front) = self.entries.front() {
            accept(front)?;
            self.entries.pop_front();
            sent += 1;
        }
        Ok(sent)
    }

    /// Put entries a dead link never wrote back at the head, in order
    ///
    /// Those entries were accepted before anything still queued, so they go
    /// first. Whatever then sits past `capacity` is removed from the tail and
    /// returned oldest first for the caller to report.
    pub fn restore(&mut self, entries: Vec<String>) -> Vec<String> {
        for entry in entries.into_iter().rev() {
            self.entries.push_front(entry);
        }
        if self.entries.len() > self.capacity {
            self.entries.split_off(self.capacity).into()
        } else {
            Vec::new()
        }
    }

    /// Discard all pending entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of pending entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of pending entries
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate pending entries in send order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}
