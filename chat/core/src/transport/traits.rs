//! Transport Traits
//!
//! A `Connector` produces one `TransportLink` per connection attempt. The
//! link owns the I/O tasks of that attempt; everything they observe is
//! reported back to the connection manager as a `TransportEvent` tagged with
//! the attempt's `AttemptId`, so events from a superseded attempt can be
//! recognised and ignored.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::error::TransportError;

/// Identifies one connection attempt within a session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl AttemptId {
    /// The attempt after this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt_{}", self.0)
    }
}

/// Something a transport observed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A raw inbound frame
    Frame(String),
    /// The peer closed the connection
    Closed,
    /// The connection failed
    Error(String),
    /// The writer could not write its in-flight frame and stopped
    WriteFailed {
        /// Why the write failed
        reason: String,
    },
}

/// A transport event tagged with the attempt that produced it
pub type TaggedEvent = (AttemptId, TransportEvent);

/// Sender half handed to connectors for reporting transport events
pub type TransportEventSender = mpsc::UnboundedSender<TaggedEvent>;

#[derive(Debug, Default)]
struct OutboxState {
    pending: VecDeque<String>,
    in_flight: Option<String>,
    closed: bool,
}

/// Encoded frames handed to a link and not yet written
///
/// The manager pushes, the connector's writer pulls. A frame stays
/// `in_flight` from the moment the writer takes it until the writer calls
/// [`Outbox::written`], so whatever a dead link never wrote can be taken
/// back with [`Outbox::reclaim`].
#[derive(Debug, Default)]
pub struct Outbox {
    state: Mutex<OutboxState>,
    ready: Notify,
}

/// Frames a link took but never wrote
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Unsent {
    /// The frame the writer was working on; it may or may not have reached
    /// the peer
    pub in_flight: Option<String>,
    /// Frames the writer never touched, oldest first
    pub pending: Vec<String>,
}

impl Outbox {
    /// Create an empty, open outbox
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame for the writer
    ///
    /// # Errors
    ///
    /// Returns `TransportError::SendFailed` once the outbox is closed.
    pub fn push(&self, frame: String) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(TransportError::SendFailed("writer closed".to_string()));
            }
            state.pending.push_back(frame);
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Wait for the next frame to write and mark it in flight
    ///
    /// Returns `None` once the outbox is closed. Meant for a single writer.
    pub async fn next(&self) -> Option<String> {
        loop {
            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(frame) = state.pending.pop_front() {
                    state.in_flight = Some(frame.clone());
                    return Some(frame);
                }
            }
            self.ready.notified().await;
        }
    }

    /// The in-flight frame was written
    pub fn written(&self) {
        self.state.lock().in_flight = None;
    }

    /// Refuse further frames; anything not written stays reclaimable
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_one();
    }

    /// Close and take back everything not written
    pub fn reclaim(&self) -> Unsent {
        let unsent = {
            let mut state = self.state.lock();
            state.closed = true;
            Unsent {
                in_flight: state.in_flight.take(),
                pending: state.pending.drain(..).collect(),
            }
        };
        self.ready.notify_one();
        unsent
    }
}

/// An established connection for one attempt
///
/// Dropping the link aborts its I/O tasks, so no further events are produced
/// for that attempt once the manager lets go of it.
#[derive(Debug)]
pub struct TransportLink {
    attempt: AttemptId,
    outbox: Arc<Outbox>,
    tasks: Vec<JoinHandle<()>>,
}

impl TransportLink {
    /// Create a link from the outbox its writer drains and the tasks serving it
    #[must_use]
    pub fn new(attempt: AttemptId, outbox: Arc<Outbox>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self {
            attempt,
            outbox,
            tasks,
        }
    }

    /// The attempt this link belongs to
    #[must_use]
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Hand an encoded frame to the writer
    ///
    /// Never waits on the network. Acceptance means the frame was queued for
    /// writing, not that the peer received it.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::SendFailed` if the writer has stopped.
    pub fn transmit(&self, frame: String) -> Result<(), TransportError> {
        self.outbox.push(frame)
    }

    /// Tear the link down, returning what it never wrote
    #[must_use]
    pub fn reclaim(self) -> Unsent {
        self.outbox.reclaim()
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        self.outbox.close();
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Opens transport connections
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `url` for the given attempt
    ///
    /// Implementations spawn their I/O tasks, report what they observe on
    /// `events` tagged with `attempt`, and return the link owning those tasks.
    async fn connect(
        &self,
        url: &str,
        attempt: AttemptId,
        events: TransportEventSender,
    ) -> Result<TransportLink, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_id_next() {
        let first = AttemptId::default();
        assert_eq!(first.next(), AttemptId(1));
        assert_eq!(first.next().to_string(), "attempt_1");
    }

    #[tokio::test]
    async fn test_drop_aborts_tasks() {
        let outbox = Arc::new(Outbox::new());
        let task = tokio::spawn(async move {
            std::future::pending::<()>().await;
        });
        let link = TransportLink::new(AttemptId(1), Arc::clone(&outbox), vec![task]);

        link.transmit("frame".to_string()).unwrap();
        assert_eq!(outbox.next().await.as_deref(), Some("frame"));

        drop(link);
        assert!(outbox.next().await.is_none());
        assert!(outbox.push("late".to_string()).is_err());
    }

    #[test]
    fn test_transmit_after_writer_gone() {
        let outbox = Arc::new(Outbox::new());
        outbox.close();
        let link = TransportLink::new(AttemptId(1), outbox, Vec::new());
        assert!(matches!(
            link.transmit("x".to_string()),
            Err(TransportError::SendFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_reclaim_returns_unwritten_frames_in_order() {
        let outbox = Arc::new(Outbox::new());
        let link = TransportLink::new(AttemptId(3), Arc::clone(&outbox), Vec::new());
        for frame in ["a", "b", "c", "d"] {
            link.transmit(frame.to_string()).unwrap();
        }

        assert_eq!(outbox.next().await.as_deref(), Some("a"));
        outbox.written();
        assert_eq!(outbox.next().await.as_deref(), Some("b"));

        assert_eq!(
            link.reclaim(),
            Unsent {
                in_flight: Some("b".to_string()),
                pending: vec!["c".to_string(), "d".to_string()],
            }
        );
        assert!(outbox.next().await.is_none());
    }

    #[tokio::test]
    async fn test_writer_wakes_for_later_push() {
        let outbox = Arc::new(Outbox::new());
        let writer = {
            let outbox = Arc::clone(&outbox);
            tokio::spawn(async move { outbox.next().await })
        };
        tokio::task::yield_now().await;
        outbox.push("late".to_string()).unwrap();
        assert_eq!(writer.await.unwrap().as_deref(), Some("late"));
    }
}
