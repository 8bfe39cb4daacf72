//! Session Store
//!
//! The ordered message log, readable by any number of UI readers. Readers
//! get immutable snapshots; the session driver is the only writer and
//! publishes a new snapshot after each reduction.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::messages::Message;

/// Immutable view of the log at one point in time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot(Arc<[Message]>);

impl Default for Snapshot {
    fn default() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl Snapshot {
    /// Messages in chronological order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.0
    }
}

impl Deref for Snapshot {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Ordered log of messages with change notification
#[derive(Default)]
pub struct SessionStore {
    current: RwLock<Snapshot>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("messages", &self.current.read().len())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current log; never observed mid-mutation
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.current.read().clone()
    }

    /// Register a change listener
    ///
    /// Listeners run on the writer's task after each reduction that changed
    /// the log, in event order, with the new snapshot. They must not block.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    /// Number of messages in the log
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Mutate a working copy of the log and publish it
    ///
    /// `mutate` returns whether it changed anything; unchanged reductions
    /// neither publish nor notify. Returns the closure's extra output.
    pub(crate) fn apply<R>(&self, mutate: impl FnOnce(&mut Vec<Message>) -> (bool, R)) -> R {
        let mut working = self.current.read().to_vec();
        let (changed, output) = mutate(&mut working);
        if !changed {
            return output;
        }

        let snapshot = Snapshot(working.into());
        *self.current.write() = snapshot.clone();

        // Clone out so listeners can (un)subscribe without deadlocking
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{MessageId, Speaker};
    use std::sync::atomic::AtomicUsize;

    fn push(store: &SessionStore, id: u64, text: &str) {
        store.apply(|log| {
            log.push(Message::complete(MessageId(id), Speaker::User, text.to_string()));
            (true, ())
        });
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let store = SessionStore::new();
        push(&store, 0, "first");

        let before = store.snapshot();
        push(&store, 1, "second");

        assert_eq!(before.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(store.snapshot()[0].content, "first");
    }

    #[test]
    fn test_listeners_notified_in_order() {
        let store = SessionStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        store.subscribe(move |snap| sink.lock().push(snap.len()));

        push(&store, 0, "a");
        push(&store, 1, "b");

        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_unchanged_reduction_does_not_notify() {
        let store = SessionStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let out = store.apply(|_| (false, 7));

        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let store = SessionStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        push(&store, 0, "a");
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        push(&store, 1, "b");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
