//! Chat Session
//!
//! Binds the connection manager, the assembler and the store into the
//! object a UI holds. A driver task consumes connection events in order and
//! is the only writer of the store.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::assembler::MessageAssembler;
use crate::connection::{ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState};
use crate::error::ChatError;
use crate::history::{HistorySink, NoopHistory};
use crate::messages::Message;
use crate::store::{SessionStore, Snapshot, SubscriptionId};
use crate::transport::endpoint::{AuthToken, Endpoint};
use crate::transport::frame::FrameKind;
use crate::transport::traits::Connector;

/// Buffered notices per subscriber before the slowest one starts lagging
const NOTICE_CAPACITY: usize = 64;

/// Things a UI status line may want to show
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionNotice {
    /// The channel changed state
    StateChanged(ConnectionState),
    /// A sent message was lost by the transport
    SendFailed {
        /// The lost text
        text: String,
        /// Transport-reported reason
        reason: String,
    },
    /// The server sent an `error` frame
    ServerError(String),
}

/// One streaming chat session
///
/// Holds the credential for its whole life. Must be created inside a Tokio
/// runtime. Dropping the session closes it.
pub struct ChatSession {
    token: AuthToken,
    manager: ConnectionManager,
    store: Arc<SessionStore>,
    notices: broadcast::Sender<SessionNotice>,
    driver: JoinHandle<()>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("token", &self.token)
            .field("manager", &self.manager)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Create a session that keeps no history
    #[must_use]
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>, token: AuthToken) -> Self {
        Self::with_history(config, connector, token, Arc::new(NoopHistory))
    }

    /// Create a session that hands completed messages to `history`
    #[must_use]
    pub fn with_history(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        token: AuthToken,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        let (manager, events) = ConnectionManager::new(config, connector);
        let store = Arc::new(SessionStore::new());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let driver = tokio::spawn(drive(
            events,
            Arc::clone(&store),
            history,
            notices.clone(),
        ));

        Self {
            token,
            manager,
            store,
            notices,
            driver,
        }
    }

    /// Connect to `endpoint` with the session's credential
    ///
    /// # Errors
    ///
    /// Returns `ChatError::AlreadyOpen` if the session was opened or closed
    /// before.
    pub fn open(&self, endpoint: Endpoint) -> Result<(), ChatError> {
        self.manager.open(endpoint, self.token.clone())
    }

    /// Send user text; queued while the channel is not open
    ///
    /// The message appears in the log when the server echoes it.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::send`].
    pub fn send(&self, text: impl Into<String>) -> Result<(), ChatError> {
        self.manager.send(text)
    }

    /// Close the session; idempotent
    pub fn close(&self) {
        self.manager.close();
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Number of messages waiting for the channel to open
    #[must_use]
    pub fn pending(&self) -> usize {
        self.manager.pending()
    }

    /// Current message log
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Register a log-change listener
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    /// Remove a log-change listener
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Subscribe to state and error notices
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.manager.close();
        self.driver.abort();
    }
}

/// Consume connection events until the manager goes away
async fn drive(
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    store: Arc<SessionStore>,
    history: Arc<dyn HistorySink>,
    notices: broadcast::Sender<SessionNotice>,
) {
    let mut assembler = MessageAssembler::new();

    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::StateChanged(state) => {
                // A stream resumed after a drop is not the same turn
                if state != ConnectionState::Open {
                    assembler.interrupt();
                }
                let _ = notices.send(SessionNotice::StateChanged(state));
            }
            ConnectionEvent::FrameReceived(frame) if frame.kind == FrameKind::Error => {
                tracing::warn!(error = %frame.payload, "Server reported an error");
                let _ = notices.send(SessionNotice::ServerError(frame.payload));
            }
            ConnectionEvent::FrameReceived(frame) => {
                let completed: Vec<Message> = store.apply(|log| {
                    let reduction = assembler.reduce(log, &frame);
                    let completed: Vec<Message> = reduction
                        .completed
                        .iter()
                        .filter_map(|id| log.iter().find(|m| m.id == *id).cloned())
                        .collect();
                    (reduction.changed, completed)
                });

                for message in &completed {
                    if let Err(e) = history.save(message).await {
                        tracing::warn!(message_id = %message.id, error = %e, "Failed to save message");
                    }
                }
            }
            ConnectionEvent::SendFailed { text, reason } => {
                tracing::warn!(%reason, len = text.len(), "User message lost in transport");
                let _ = notices.send(SessionNotice::SendFailed { text, reason });
            }
        }
    }

    tracing::debug!("Session driver finished");
}
