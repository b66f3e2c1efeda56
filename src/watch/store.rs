//! Watch store
//!
//! Decorator that publishes successful mutations of the wrapped store to
//! subscribers.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::WatchConfig;
use crate::error::Result;
use crate::store::KvStore;
use crate::value::Value;

use super::handle::{CancelHandle, ListenerGuard, Relay, WatchStream};
use super::registry::{Registry, SubscriptionKey};
use super::{EventKind, Update, WatchOp};

/// Store wrapper adding subscriptions and fan-out of change events
///
/// ## Ordering
/// `put` and `delete` apply the mutation and enqueue its update while
/// holding the sequencer lock, so updates reach the dispatcher in applied
/// order and carry strictly increasing revisions. `get` bypasses the
/// sequencer.
///
/// ## Threads
/// One dispatcher thread per store, plus one relay thread per `All`
/// subscription. Dropping the store closes every stream and joins the
/// dispatcher.
pub struct WatchStore<S> {
    inner: S,
    registry: Arc<Registry>,
    sequencer: Mutex<Sequencer>,
}

/// State serialized with every mutation
struct Sequencer {
    /// Revision of the last applied mutation
    revision: u64,
    queue: Option<Sender<Update>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl<S: KvStore> WatchStore<S> {
    /// Wrap `inner` with default watch settings
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, WatchConfig::default())
    }

    /// Wrap `inner` with the given watch settings
    pub fn with_config(inner: S, config: WatchConfig) -> Self {
        let registry = Arc::new(Registry::new(config));
        let (queue, updates) = unbounded();
        let dispatcher = spawn_dispatcher(Arc::clone(&registry), updates);

        Self {
            inner,
            registry,
            sequencer: Mutex::new(Sequencer {
                revision: 0,
                queue: Some(queue),
                dispatcher: Some(dispatcher),
            }),
        }
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Revision of the last applied mutation
    pub fn revision(&self) -> u64 {
        self.sequencer.lock().revision
    }

    /// Live listeners for (key, kind); an `All` watch counts once per kind
    pub fn listener_count(&self, key: &str, kind: EventKind) -> usize {
        self.registry.listener_count(key, kind)
    }

    /// Number of (key, kind) entries with at least one listener
    pub fn subscription_count(&self) -> usize {
        self.registry.subscription_count()
    }

    /// Events discarded by the overflow policy so far
    pub fn dropped_events(&self) -> u64 {
        self.registry.dropped_events()
    }

    fn subscribe(&self, since: u64, key: &str, kind: EventKind) -> (ListenerGuard, Receiver<Update>) {
        let sub = SubscriptionKey::new(key, kind);
        let (id, events) = self.registry.register(sub.clone(), since);
        (ListenerGuard::new(Arc::clone(&self.registry), sub, id), events)
    }
}

impl<S: KvStore> KvStore for WatchStore<S> {
    fn put(&self, key: &str, value: Value) -> Result<()> {
        let mut sequencer = self.sequencer.lock();

        let published = self
            .registry
            .has_listeners(key, EventKind::Put)
            .then(|| value.clone());

        self.inner.put(key, value)?;

        let revision = sequencer.advance();
        if let Some(value) = published {
            sequencer.enqueue(Update::put(key, value, revision));
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Value> {
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut sequencer = self.sequencer.lock();

        self.inner.delete(key)?;

        let revision = sequencer.advance();
        if self.registry.has_listeners(key, EventKind::Delete) {
            sequencer.enqueue(Update::delete(key, revision));
        }
        Ok(())
    }

    fn add_watch(&self, key: &str, op: WatchOp) -> Result<(WatchStream, CancelHandle)> {
        // Registering under the sequencer pins the starting revision: the
        // listener sees exactly the mutations applied after this point.
        let sequencer = self.sequencer.lock();
        let since = sequencer.revision;

        match op.event_kind() {
            Some(kind) => {
                let (guard, events) = self.subscribe(since, key, kind);
                drop(sequencer);
                Ok((WatchStream::new(events), CancelHandle::listener(guard)))
            }
            None => {
                let (put_guard, puts) = self.subscribe(since, key, EventKind::Put);
                let (delete_guard, deletes) = self.subscribe(since, key, EventKind::Delete);
                drop(sequencer);

                let (relay, events) = Relay::spawn(puts, deletes, self.registry.buffer_size());
                debug!(key, "composite watch started");
                Ok((
                    WatchStream::new(events),
                    CancelHandle::relay(put_guard, delete_guard, relay),
                ))
            }
        }
    }
}

impl Sequencer {
    fn advance(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn enqueue(&self, update: Update) {
        if let Some(queue) = &self.queue {
            // Unbounded: the mutating caller never waits on subscribers
            if queue.send(update).is_err() {
                warn!("watch dispatcher is gone, update not published");
            }
        }
    }
}

impl<S> Drop for WatchStore<S> {
    fn drop(&mut self) {
        let sequencer = self.sequencer.get_mut();

        // Dropping the queue ends the dispatcher loop
        sequencer.queue.take();
        if let Some(dispatcher) = sequencer.dispatcher.take() {
            if dispatcher.join().is_err() {
                warn!("watch dispatcher thread panicked");
            }
        }

        self.registry.close_all();
    }
}

fn spawn_dispatcher(registry: Arc<Registry>, updates: Receiver<Update>) -> JoinHandle<()> {
    thread::spawn(move || {
        debug!("watch dispatcher started");
        for update in updates.iter() {
            registry.publish(&update);
        }
        debug!("watch dispatcher stopped");
    })
}
