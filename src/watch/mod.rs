//! Watch Module
//!
//! Change notification layered over any [`KvStore`](crate::store::KvStore).
//!
//! ## Architecture
//!
//! ```text
//! put/delete (caller thread):
//!   sequencer lock -> inner store -> revision += 1 -> queue.send(update)
//!                                                          ↓
//! Dispatcher thread (one per WatchStore):
//!   queue.recv() -> registry read lock -> try_send(per-listener buffer)
//!                                                          ↓
//! Consumer:
//!   WatchStream::recv()
//! ```
//!
//! `All` subscriptions are two registry listeners (Put and Delete) merged
//! by a relay thread in revision order.
//!
//! ## Backpressure
//! Listener buffers are bounded. When one is full the configured
//! [`OverflowPolicy`](crate::config::OverflowPolicy) decides which event is
//! dropped; the dispatcher never blocks and a slow consumer never delays
//! another listener or the mutating caller.
//!
//! ## Lifecycle
//! Registered → Active → Cancelled. [`CancelHandle::cancel`] (or dropping
//! the handle) removes the listener, discards undelivered events and closes
//! the stream; the registry entry is pruned with its last listener.

mod handle;
mod registry;
mod store;

pub use handle::{CancelHandle, WatchStream};
pub use store::WatchStore;

use std::fmt;
use std::str::FromStr;

use crate::error::{KvError, Result};
use crate::value::Value;

/// What a subscription asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WatchOp {
    /// Both puts and deletes; never published itself
    All = 1,
    Put = 2,
    Delete = 3,
}

impl WatchOp {
    /// Wire value
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The single event kind this op subscribes to, if it is not `All`
    pub fn event_kind(self) -> Option<EventKind> {
        match self {
            WatchOp::All => None,
            WatchOp::Put => Some(EventKind::Put),
            WatchOp::Delete => Some(EventKind::Delete),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WatchOp::All => "all",
            WatchOp::Put => "put",
            WatchOp::Delete => "delete",
        }
    }
}

impl fmt::Display for WatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for WatchOp {
    type Error = KvError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(WatchOp::All),
            2 => Ok(WatchOp::Put),
            3 => Ok(WatchOp::Delete),
            _ => Err(KvError::Decode(format!(
                "unknown watch operation 0x{:02x}",
                code
            ))),
        }
    }
}

impl FromStr for WatchOp {
    type Err = KvError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(WatchOp::All),
            "put" => Ok(WatchOp::Put),
            "delete" | "del" => Ok(WatchOp::Delete),
            _ => Err(KvError::Parse(format!("unknown watch type: {}", name))),
        }
    }
}

/// Kind of a published change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Put,
    Delete,
}

impl EventKind {
    /// Wire value (shared with [`WatchOp`])
    pub fn code(self) -> u8 {
        WatchOp::from(self).code()
    }
}

impl From<EventKind> for WatchOp {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Put => WatchOp::Put,
            EventKind::Delete => WatchOp::Delete,
        }
    }
}

impl TryFrom<u8> for EventKind {
    type Error = KvError;

    fn try_from(code: u8) -> Result<Self> {
        WatchOp::try_from(code)?
            .event_kind()
            .ok_or_else(|| KvError::Decode("`all` is not an event kind".to_string()))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        WatchOp::from(*self).fmt(f)
    }
}

/// One published change
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub kind: EventKind,
    pub key: String,
    /// New value; `None` for deletes
    pub value: Option<Value>,
    /// Position of the mutation in its watch engine's applied order
    pub revision: u64,
}

impl Update {
    pub fn put(key: impl Into<String>, value: Value, revision: u64) -> Self {
        Self {
            kind: EventKind::Put,
            key: key.into(),
            value: Some(value),
            revision,
        }
    }

    pub fn delete(key: impl Into<String>, revision: u64) -> Self {
        Self {
            kind: EventKind::Delete,
            key: key.into(),
            value: None,
            revision,
        }
    }
}
