//! Subscription registry
//!
//! Maps (key, event kind) to the listeners subscribed to it. One RwLock
//! guards the whole map:
//! - publishing holds it shared while iterating and sending
//! - register/remove hold it exclusively
//!
//! so a listener is never delivered to after its removal returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::config::{OverflowPolicy, WatchConfig};

use super::{EventKind, Update};

pub(crate) type ListenerId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionKey {
    key: String,
    kind: EventKind,
}

impl SubscriptionKey {
    pub(crate) fn new(key: &str, kind: EventKind) -> Self {
        Self {
            key: key.to_string(),
            kind,
        }
    }
}

/// One listener endpoint
struct Listener {
    id: ListenerId,

    /// Last revision applied before registration; older events are skipped
    since: u64,

    sender: Sender<Update>,

    /// Registry-side handle on the buffer, for eviction and draining
    buffer: Receiver<Update>,
}

impl Listener {
    /// Discard undelivered events; dropping `self` then closes the stream
    fn close(self) {
        while self.buffer.try_recv().is_ok() {}
    }
}

pub(crate) struct Registry {
    subscriptions: RwLock<HashMap<SubscriptionKey, Vec<Listener>>>,
    next_id: AtomicU64,
    dropped: AtomicU64,
    config: WatchConfig,
}

impl Registry {
    pub(crate) fn new(config: WatchConfig) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
            config,
        }
    }

    pub(crate) fn buffer_size(&self) -> usize {
        self.config.buffer_size
    }

    /// Add a listener that receives events with revision > `since`
    pub(crate) fn register(
        &self,
        sub: SubscriptionKey,
        since: u64,
    ) -> (ListenerId, Receiver<Update>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = bounded(self.config.buffer_size);

        let listener = Listener {
            id,
            since,
            sender,
            buffer: receiver.clone(),
        };

        debug!(
            listener = id,
            key = %sub.key,
            kind = %sub.kind,
            since,
            "watch registered"
        );

        self.subscriptions
            .write()
            .entry(sub)
            .or_default()
            .push(listener);

        (id, receiver)
    }

    /// Remove and close one listener, pruning its entry if it was the last
    ///
    /// Returns false if the listener was already gone.
    pub(crate) fn remove(&self, sub: &SubscriptionKey, id: ListenerId) -> bool {
        let mut subscriptions = self.subscriptions.write();

        let Some(listeners) = subscriptions.get_mut(sub) else {
            return false;
        };
        let Some(position) = listeners.iter().position(|l| l.id == id) else {
            return false;
        };

        let listener = listeners.remove(position);
        if listeners.is_empty() {
            subscriptions.remove(sub);
        }
        listener.close();

        debug!(listener = id, key = %sub.key, kind = %sub.kind, "watch removed");
        true
    }

    /// Remove and close every listener
    pub(crate) fn close_all(&self) {
        let drained: Vec<_> = self.subscriptions.write().drain().collect();
        for (_, listeners) in drained {
            for listener in listeners {
                listener.close();
            }
        }
    }

    pub(crate) fn has_listeners(&self, key: &str, kind: EventKind) -> bool {
        self.subscriptions
            .read()
            .contains_key(&SubscriptionKey::new(key, kind))
    }

    /// Fan an update out to every listener of its (key, kind)
    ///
    /// Returns the number of listeners that accepted it.
    pub(crate) fn publish(&self, update: &Update) -> usize {
        let subscriptions = self.subscriptions.read();

        let sub = SubscriptionKey::new(&update.key, update.kind);
        let Some(listeners) = subscriptions.get(&sub) else {
            return 0;
        };

        let delivered = listeners
            .iter()
            .filter(|l| update.revision > l.since)
            .filter(|l| self.deliver(l, update.clone()))
            .count();

        trace!(
            key = %update.key,
            kind = %update.kind,
            revision = update.revision,
            listeners = listeners.len(),
            delivered,
            "update published"
        );

        delivered
    }

    /// Non-blocking handoff into one listener's buffer
    fn deliver(&self, listener: &Listener, update: Update) -> bool {
        let update = match listener.sender.try_send(update) {
            Ok(()) => return true,
            Err(TrySendError::Full(update)) => update,
            // The registry holds a receiver, so the channel cannot disconnect
            Err(TrySendError::Disconnected(_)) => return false,
        };

        match self.config.overflow {
            OverflowPolicy::DropNewest => {
                self.record_drop(listener.id, &update);
                false
            }
            OverflowPolicy::DropOldest => {
                let mut update = update;
                // Re-check for room before every eviction
                loop {
                    match listener.sender.try_send(update) {
                        Ok(()) => return true,
                        Err(TrySendError::Full(rejected)) => update = rejected,
                        Err(TrySendError::Disconnected(_)) => return false,
                    }
                    match listener.buffer.try_recv() {
                        Ok(evicted) => self.record_drop(listener.id, &evicted),
                        // Drained between the two calls; retry the send
                        Err(_) => continue,
                    }
                }
            }
        }
    }

    fn record_drop(&self, id: ListenerId, update: &Update) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            listener = id,
            key = %update.key,
            revision = update.revision,
            "listener buffer full, event dropped"
        );
    }

    pub(crate) fn listener_count(&self, key: &str, kind: EventKind) -> usize {
        self.subscriptions
            .read()
            .get(&SubscriptionKey::new(key, kind))
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub(crate) fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
