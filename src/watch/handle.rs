//! Watch handles
//!
//! The consumer side of a subscription ([`WatchStream`]), the handle that
//! ends it ([`CancelHandle`]), and the relay thread behind `All` watches.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, select, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::registry::{ListenerId, Registry, SubscriptionKey};
use super::{EventKind, Update};

/// Events of one subscription, in publication order
///
/// The stream ends (`recv` returns `None`) once the subscription is
/// cancelled or its store is dropped.
#[derive(Debug)]
pub struct WatchStream {
    events: Receiver<Update>,
}

impl WatchStream {
    pub(crate) fn new(events: Receiver<Update>) -> Self {
        Self { events }
    }

    /// Block until the next event, or `None` once the stream is closed
    pub fn recv(&self) -> Option<Update> {
        self.events.recv().ok()
    }

    /// Next event if one is buffered
    pub fn try_recv(&self) -> Option<Update> {
        self.events.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Update, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// True when no event is buffered
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Blocking iterator that ends when the stream closes
    pub fn iter(&self) -> impl Iterator<Item = Update> + '_ {
        self.events.iter()
    }

    /// Underlying channel, for use in `select!`
    pub fn receiver(&self) -> &Receiver<Update> {
        &self.events
    }
}

/// Ends a subscription
///
/// Cancelling is synchronous: when `cancel` returns, the listener is out
/// of the registry, undelivered events are discarded and the stream reads
/// as closed. A second `cancel` is a no-op. Dropping the handle cancels.
#[must_use = "dropping a CancelHandle cancels the watch"]
pub struct CancelHandle {
    state: Mutex<Option<Cancellation>>,
}

enum Cancellation {
    Listener(ListenerGuard),
    Relay {
        put: ListenerGuard,
        delete: ListenerGuard,
        relay: Relay,
    },
}

impl CancelHandle {
    pub(crate) fn listener(guard: ListenerGuard) -> Self {
        Self {
            state: Mutex::new(Some(Cancellation::Listener(guard))),
        }
    }

    pub(crate) fn relay(put: ListenerGuard, delete: ListenerGuard, relay: Relay) -> Self {
        Self {
            state: Mutex::new(Some(Cancellation::Relay { put, delete, relay })),
        }
    }

    pub fn cancel(&self) {
        let taken = self.state.lock().take();
        match taken {
            Some(Cancellation::Listener(guard)) => guard.release(),
            Some(Cancellation::Relay { put, delete, relay }) => {
                // Closing the children first lets the relay see disconnects
                // even if it never gets to observe the stop signal.
                put.release();
                delete.release();
                relay.stop();
            }
            None => {}
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().is_none()
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Registry address of one listener
pub(crate) struct ListenerGuard {
    registry: Arc<Registry>,
    sub: SubscriptionKey,
    id: ListenerId,
}

impl ListenerGuard {
    pub(crate) fn new(registry: Arc<Registry>, sub: SubscriptionKey, id: ListenerId) -> Self {
        Self { registry, sub, id }
    }

    fn release(self) {
        self.registry.remove(&self.sub, self.id);
    }
}

// =============================================================================
// Relay
// =============================================================================

/// Background thread merging the Put and Delete children of an `All` watch
pub(crate) struct Relay {
    stop: Sender<()>,
    thread: JoinHandle<()>,
    output: Receiver<Update>,
}

impl Relay {
    /// Start merging `puts` and `deletes`; returns the relay and its output
    pub(crate) fn spawn(
        puts: Receiver<Update>,
        deletes: Receiver<Update>,
        capacity: usize,
    ) -> (Self, Receiver<Update>) {
        let (output_tx, output_rx) = bounded(capacity);
        // Never sent on; dropping the sender is the stop signal
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let thread = thread::spawn(move || merge(puts, deletes, output_tx, stop_rx));

        let relay = Self {
            stop: stop_tx,
            thread,
            output: output_rx.clone(),
        };
        (relay, output_rx)
    }

    /// Signal, join, then discard anything left in the output buffer
    fn stop(self) {
        let Relay {
            stop,
            thread,
            output,
        } = self;

        drop(stop);
        if thread.join().is_err() {
            warn!("watch relay thread panicked");
        }
        while output.try_recv().is_ok() {}
    }
}

/// Forward events from both children in revision order
///
/// The dispatcher delivers to the two children one event at a time in
/// revision order. So once an event with revision `r` arrives from one
/// child, every event with a lower revision bound for the other child is
/// already in that child's buffer, and a non-blocking peek decides which
/// goes first.
fn merge(
    puts: Receiver<Update>,
    deletes: Receiver<Update>,
    output: Sender<Update>,
    stop: Receiver<()>,
) {
    let mut pending_put: Option<Update> = None;
    let mut pending_delete: Option<Update> = None;

    loop {
        if pending_put.is_none() && pending_delete.is_none() {
            let received = select! {
                recv(puts) -> msg => msg.ok(),
                recv(deletes) -> msg => msg.ok(),
                recv(stop) -> _ => None,
            };
            match received {
                Some(update) => match update.kind {
                    EventKind::Put => pending_put = Some(update),
                    EventKind::Delete => pending_delete = Some(update),
                },
                None => break,
            }
        }

        if pending_put.is_none() {
            pending_put = puts.try_recv().ok();
        }
        if pending_delete.is_none() {
            pending_delete = deletes.try_recv().ok();
        }

        let next = match (pending_put.take(), pending_delete.take()) {
            (Some(put), Some(delete)) if put.revision < delete.revision => {
                pending_delete = Some(delete);
                put
            }
            (Some(put), Some(delete)) => {
                pending_put = Some(put);
                delete
            }
            (Some(put), None) => put,
            (None, Some(delete)) => delete,
            (None, None) => continue,
        };

        let forwarded = select! {
            send(output, next) -> res => res.is_ok(),
            recv(stop) -> _ => false,
        };
        if !forwarded {
            break;
        }
    }

    trace!("watch relay stopped");
}
