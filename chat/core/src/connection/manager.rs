//! Connection Actor
//!
//! `ConnectionManager` is the caller-facing handle; the reconnect loop runs
//! in a spawned task. Both sides share one lock over the state, the outbound
//! queue, the live link and the event sender. Every state change and every
//! emitted event happens under that lock and is refused once the state is
//! `Closed`, so `close()` is a hard barrier: nothing is emitted after it.
//!
//! When an attempt ends, frames its link took but never wrote are taken
//! back. The one the writer was working on is reported as `SendFailed`; the
//! rest return to the head of the outbound queue and go out first on the
//! next `Open`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};

use super::{Backoff, ConnectionConfig, ConnectionEvent, ConnectionState};
use crate::error::{ChatError, TransportError};
use crate::outbound::OutboundQueue;
use crate::transport::endpoint::{AuthToken, Endpoint};
use crate::transport::frame::{self, Frame};
use crate::transport::traits::{
    AttemptId, Connector, TaggedEvent, TransportEvent, TransportLink, Unsent,
};

/// State shared between the handle and the actor
struct Shared {
    state: ConnectionState,
    queue: OutboundQueue,
    link: Option<TransportLink>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl Shared {
    /// Move to `next`, emitting `StateChanged` if it differs
    ///
    /// Returns false (and does nothing) once `Closed`.
    fn transition(&mut self, next: ConnectionState) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        if self.state != next {
            tracing::info!(from = %self.state, to = %next, "Connection state changed");
            self.state = next;
            let _ = self.events.send(ConnectionEvent::StateChanged(next));
        }
        true
    }

    /// Emit an event unless the channel is closed
    fn emit(&self, event: ConnectionEvent) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        let _ = self.events.send(event);
        true
    }

    /// Flush the queue through `link` and go `Open`
    ///
    /// Runs under the lock so no concurrent `send` can slip ahead of queued
    /// entries.
    fn open_with(&mut self, link: TransportLink) -> Result<usize, TransportError> {
        let mut undeliverable = Vec::new();
        let flushed = self.queue.flush(|text| match frame::encode(&Frame::user_message(text)) {
            Ok(encoded) => link.transmit(encoded),
            Err(e) => {
                undeliverable.push((text.to_string(), e.to_string()));
                Ok(())
            }
        });

        for (text, reason) in undeliverable {
            self.emit(ConnectionEvent::SendFailed { text, reason });
        }

        let flushed = match flushed {
            Ok(flushed) => flushed,
            Err(e) => {
                self.recover(link.reclaim(), &undelivered_reason(&e));
                return Err(e);
            }
        };
        self.link = Some(link);
        self.transition(ConnectionState::Open);
        Ok(flushed)
    }

    /// Drop the live link, keeping what it never wrote
    fn release_link(&mut self, reason: &str) {
        if let Some(link) = self.link.take() {
            self.recover(link.reclaim(), reason);
        }
    }

    /// Report the in-flight frame and requeue the untouched ones
    ///
    /// The in-flight frame may already have reached the server, so it is
    /// reported rather than resent.
    fn recover(&mut self, unsent: Unsent, reason: &str) {
        if let Some(raw) = unsent.in_flight {
            self.emit(ConnectionEvent::SendFailed {
                text: payload_of(raw),
                reason: reason.to_string(),
            });
        }
        if unsent.pending.is_empty() {
            return;
        }

        let requeued = unsent.pending.len();
        let overflow = self
            .queue
            .restore(unsent.pending.into_iter().map(payload_of).collect());
        tracing::debug!(requeued, overflow = overflow.len(), "Unwritten messages requeued");
        for text in overflow {
            self.emit(ConnectionEvent::SendFailed {
                text,
                reason: "offline queue full".to_string(),
            });
        }
    }
}

/// How a single connection attempt ended
enum AttemptEnd {
    /// The attempt failed; reconnect after backoff
    Failed(TransportError),
    /// The channel was closed while the attempt ran
    Closed,
}

struct ActorHandle {
    shutdown: oneshot::Sender<()>,
}

/// Handle to the logical chat channel
///
/// Created `Disconnected`. `open` starts the connection actor; `close` stops
/// it for good. Dropping the handle closes the channel.
pub struct ConnectionManager {
    shared: Arc<Mutex<Shared>>,
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    actor: Mutex<Option<ActorHandle>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("ConnectionManager")
            .field("state", &shared.state)
            .field("queued", &shared.queue.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager and the receiver for its events
    #[must_use]
    pub fn new(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Shared {
            state: ConnectionState::Disconnected,
            queue: OutboundQueue::new(config.queue_capacity),
            link: None,
            events,
        };

        let manager = Self {
            shared: Arc::new(Mutex::new(shared)),
            config,
            connector,
            actor: Mutex::new(None),
        };
        (manager, rx)
    }

    /// Start connecting to `endpoint` with `token`
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::AlreadyOpen` unless the manager is `Disconnected`.
    pub fn open(&self, endpoint: Endpoint, token: AuthToken) -> Result<(), ChatError> {
        let mut shared = self.shared.lock();
        if shared.state != ConnectionState::Disconnected {
            return Err(ChatError::AlreadyOpen {
                state: shared.state,
            });
        }

        tracing::info!(endpoint = %endpoint.as_str(), "Opening chat channel");
        shared.transition(ConnectionState::Connecting);

        let (shutdown, shutdown_rx) = oneshot::channel();
        let actor = Actor {
            shared: Arc::clone(&self.shared),
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
            url: endpoint.authenticated_url(&token),
        };
        tokio::spawn(actor.run(shutdown_rx));
        *self.actor.lock() = Some(ActorHandle { shutdown });

        Ok(())
    }

    /// Send a user message, or queue it until the channel is `Open`
    ///
    /// Never waits on the network.
    ///
    /// # Errors
    ///
    /// - `ChatError::Backpressure` if the message must be queued and the
    ///   queue is full
    /// - `ChatError::NotConnected` after `close`
    /// - `ChatError::MalformedFrame` if the text cannot fit in a frame
    pub fn send(&self, text: impl Into<String>) -> Result<(), ChatError> {
        let text = text.into();
        let encoded = frame::encode(&Frame::user_message(text.as_str()))?;

        let mut shared = self.shared.lock();
        match shared.state {
            ConnectionState::Closed => Err(ChatError::NotConnected),
            ConnectionState::Open => {
                let transmitted = shared
                    .link
                    .as_ref()
                    .map(|link| link.transmit(encoded));
                match transmitted {
                    Some(Ok(())) => {
                        tracing::trace!(len = text.len(), "User message transmitted");
                        Ok(())
                    }
                    // Writer already gone; the actor is about to reconnect
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "Transmit refused, queueing");
                        shared.queue.enqueue(text)
                    }
                    None => shared.queue.enqueue(text),
                }
            }
            _ => {
                shared.queue.enqueue(text)?;
                tracing::debug!(pending = shared.queue.len(), "User message queued");
                Ok(())
            }
        }
    }

    /// Close the channel
    ///
    /// Idempotent. Cancels any pending reconnect, tears down the transport
    /// and discards queued messages. Emits `StateChanged(Closed)` once; no
    /// event follows it.
    pub fn close(&self) {
        {
            let mut shared = self.shared.lock();
            if shared.state == ConnectionState::Closed {
                return;
            }
            let discarded = shared.queue.len();
            shared.queue.clear();
            shared.link = None;
            shared.transition(ConnectionState::Closed);
            tracing::info!(discarded, "Chat channel closed");
        }

        if let Some(actor) = self.actor.lock().take() {
            let _ = actor.shutdown.send(());
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Number of queued user messages
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// The reconnect loop
struct Actor {
    shared: Arc<Mutex<Shared>>,
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    url: String,
}

impl Actor {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<TaggedEvent>();
        let mut backoff = Backoff::new(self.config.reconnect.clone());
        let mut attempt = AttemptId::default();

        loop {
            attempt = attempt.next();
            if !self.shared.lock().transition(ConnectionState::Connecting) {
                return;
            }
            tracing::debug!(%attempt, "Connection attempt starting");

            let end = tokio::select! {
                _ = &mut shutdown => return,
                end = self.run_attempt(attempt, &tx, &mut rx, &mut backoff) => end,
            };

            let reason = match end {
                AttemptEnd::Closed => return,
                AttemptEnd::Failed(reason) => reason,
            };

            let delay = {
                let mut shared = self.shared.lock();
                // Complete teardown before the next attempt
                shared.release_link(&undelivered_reason(&reason));
                if !shared.transition(ConnectionState::Reconnecting) {
                    return;
                }
                backoff.next_delay()
            };
            tracing::warn!(
                %attempt,
                error = %reason,
                retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Connection lost, reconnecting"
            );

            tokio::select! {
                _ = &mut shutdown => return,
                () = sleep(delay) => {}
            }
        }
    }

    /// Drive one attempt from connect until it fails or the channel closes
    async fn run_attempt(
        &self,
        attempt: AttemptId,
        tx: &mpsc::UnboundedSender<TaggedEvent>,
        rx: &mut mpsc::UnboundedReceiver<TaggedEvent>,
        backoff: &mut Backoff,
    ) -> AttemptEnd {
        let connect = self.connector.connect(&self.url, attempt, tx.clone());
        let link = match timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => return AttemptEnd::Failed(e),
            Err(_) => {
                return AttemptEnd::Failed(TransportError::ConnectionFailed(
                    "connect timed out".to_string(),
                ))
            }
        };

        if !self.shared.lock().transition(ConnectionState::Authenticating) {
            return AttemptEnd::Closed;
        }

        let ack = if self.config.require_ack {
            match timeout(self.config.auth_timeout, next_event(rx, attempt)).await {
                Ok(TransportEvent::Frame(raw)) => Some(raw),
                Ok(event) => return AttemptEnd::Failed(failure_of(event)),
                Err(_) => return AttemptEnd::Failed(TransportError::AuthenticationTimeout),
            }
        } else {
            None
        };

        {
            let mut shared = self.shared.lock();
            if shared.state == ConnectionState::Closed {
                return AttemptEnd::Closed;
            }
            match shared.open_with(link) {
                Ok(flushed) => tracing::info!(%attempt, flushed, "Chat channel open"),
                Err(e) => return AttemptEnd::Failed(e),
            }
        }
        backoff.reset();

        if let Some(raw) = ack {
            if !self.deliver(&raw) {
                return AttemptEnd::Closed;
            }
        }

        loop {
            match next_event(rx, attempt).await {
                TransportEvent::Frame(raw) => {
                    if !self.deliver(&raw) {
                        return AttemptEnd::Closed;
                    }
                }
                event => return AttemptEnd::Failed(failure_of(event)),
            }
        }
    }

    /// Decode and forward one inbound frame; false once closed
    fn deliver(&self, raw: &str) -> bool {
        match frame::decode(raw) {
            Ok(frame) => {
                tracing::trace!(kind = ?frame.kind, "Frame received");
                self.shared.lock().emit(ConnectionEvent::FrameReceived(frame))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                self.shared.lock().state != ConnectionState::Closed
            }
        }
    }
}

/// Next event for `attempt`, skipping leftovers from superseded attempts
async fn next_event(
    rx: &mut mpsc::UnboundedReceiver<TaggedEvent>,
    attempt: AttemptId,
) -> TransportEvent {
    loop {
        match rx.recv().await {
            Some((tag, event)) if tag == attempt => return event,
            Some((tag, _)) => tracing::trace!(%tag, current = %attempt, "Ignoring stale transport event"),
            // The actor holds a sender, so the channel never closes
            None => return TransportEvent::Closed,
        }
    }
}

/// User text carried by an encoded `user_message` frame
fn payload_of(raw: String) -> String {
    frame::decode(&raw).map_or(raw, |f| f.payload)
}

/// Reason attached to `SendFailed` for messages lost with a link
fn undelivered_reason(error: &TransportError) -> String {
    match error {
        TransportError::SendFailed(reason) => reason.clone(),
        other => other.to_string(),
    }
}

fn failure_of(event: TransportEvent) -> TransportError {
    match event {
        TransportEvent::Closed => TransportError::ConnectionClosed,
        TransportEvent::Error(e) => TransportError::ConnectionFailed(e),
        TransportEvent::WriteFailed { reason } => TransportError::SendFailed(reason),
        TransportEvent::Frame(_) => TransportError::ConnectionFailed("unexpected frame".to_string()),
    }
}
