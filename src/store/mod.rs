//! Store Module
//!
//! The store contract and its in-memory implementations.
//!
//! ## Layers
//! - [`CoreStore`]: one map behind one reader/writer lock
//! - [`ShardedStore`]: N independent stores selected by a [`ShardHasher`]
//! - [`WatchStore`](crate::watch::WatchStore): decorator adding change
//!   notification to any of the above
//!
//! The production stack is `ShardedStore<WatchStore<CoreStore>>`: one
//! watch engine per shard, so the data and the subscribers of a key always
//! live behind the same shard.

mod memory;
mod sharded;

pub use memory::CoreStore;
pub use sharded::{Crc32Hasher, FirstByteHasher, ShardHasher, ShardedStore};

use crate::error::Result;
use crate::value::Value;
use crate::watch::{CancelHandle, WatchOp, WatchStream};

/// Operations every key-value store supports
pub trait KvStore: Send + Sync {
    /// Store a value, replacing any previous value for the key
    fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Fetch the value for a key (`KvError::NotFound` if absent)
    fn get(&self, key: &str) -> Result<Value>;

    /// Remove a key (`KvError::NotFound` if absent)
    fn delete(&self, key: &str) -> Result<()>;

    /// Subscribe to changes of a key
    ///
    /// Returns the event stream and the handle that ends the subscription.
    fn add_watch(&self, key: &str, op: WatchOp) -> Result<(WatchStream, CancelHandle)>;
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
    fn put(&self, key: &str, value: Value) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Result<Value> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn add_watch(&self, key: &str, op: WatchOp) -> Result<(WatchStream, CancelHandle)> {
        (**self).add_watch(key, op)
    }
}
