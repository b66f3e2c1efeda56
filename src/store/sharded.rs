//! Sharded store
//!
//! Partitions the keyspace across N independent stores so that writes to
//! unrelated keys do not contend on one lock.
//!
//! ## Routing
//! `shard = hasher.shard(N, key)` for every operation, watches included.
//! Routing is deterministic per store instance, so a key's data and its
//! subscribers always sit on the same child store. There are no
//! cross-shard operations.

use std::fmt;

use tracing::trace;

use crate::error::{KvError, Result};
use crate::value::Value;
use crate::watch::{CancelHandle, WatchOp, WatchStream};

use super::KvStore;

/// Strategy mapping a key to a shard index in `[0, buckets)`
pub trait ShardHasher: Send + Sync {
    fn shard(&self, buckets: usize, key: &str) -> Result<usize>;
}

impl<H: ShardHasher + ?Sized> ShardHasher for Box<H> {
    fn shard(&self, buckets: usize, key: &str) -> Result<usize> {
        (**self).shard(buckets, key)
    }
}

/// First byte of the key modulo the bucket count
///
/// Cheap but skewed: keys sharing a first byte share a shard. The empty
/// key has no first byte and is rejected with `KvError::ShardRouting`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstByteHasher;

impl ShardHasher for FirstByteHasher {
    fn shard(&self, buckets: usize, key: &str) -> Result<usize> {
        match key.as_bytes().first() {
            Some(&byte) => Ok(byte as usize % buckets),
            None => Err(KvError::ShardRouting(
                "empty key cannot be routed by first byte".to_string(),
            )),
        }
    }
}

/// CRC32 of the whole key modulo the bucket count
///
/// Spreads keys evenly regardless of shared prefixes; defined for every
/// key including the empty one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Hasher;

impl ShardHasher for Crc32Hasher {
    fn shard(&self, buckets: usize, key: &str) -> Result<usize> {
        Ok(crc32fast::hash(key.as_bytes()) as usize % buckets)
    }
}

/// A fixed set of child stores addressed by key hash
pub struct ShardedStore<S> {
    shards: Vec<S>,
    hasher: Box<dyn ShardHasher>,
}

impl<S: KvStore> ShardedStore<S> {
    /// Create `bucket_count` children with `factory`, routed by `hasher`
    pub fn new<F, H>(bucket_count: usize, mut factory: F, hasher: H) -> Result<Self>
    where
        F: FnMut() -> S,
        H: ShardHasher + 'static,
    {
        if bucket_count == 0 {
            return Err(KvError::Config(
                "sharded store needs at least one bucket".to_string(),
            ));
        }

        let shards = (0..bucket_count).map(|_| factory()).collect();

        Ok(Self {
            shards,
            hasher: Box::new(hasher),
        })
    }

    /// Shard index for a key
    ///
    /// Fails if the hasher rejects the key or answers out of range.
    pub fn shard_for(&self, key: &str) -> Result<usize> {
        let buckets = self.shards.len();
        let index = self.hasher.shard(buckets, key)?;
        if index >= buckets {
            return Err(KvError::ShardRouting(format!(
                "hasher returned shard {} for {} buckets",
                index, buckets
            )));
        }
        Ok(index)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Child store at `index`
    pub fn shard(&self, index: usize) -> Option<&S> {
        self.shards.get(index)
    }

    fn route(&self, key: &str) -> Result<&S> {
        let index = self.shard_for(key)?;
        trace!(key, shard = index, "routed");
        Ok(&self.shards[index])
    }
}

impl<S: KvStore> KvStore for ShardedStore<S> {
    fn put(&self, key: &str, value: Value) -> Result<()> {
        self.route(key)?.put(key, value)
    }

    fn get(&self, key: &str) -> Result<Value> {
        self.route(key)?.get(key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.route(key)?.delete(key)
    }

    fn add_watch(&self, key: &str, op: WatchOp) -> Result<(WatchStream, CancelHandle)> {
        self.route(key)?.add_watch(key, op)
    }
}

impl<S> fmt::Debug for ShardedStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedStore")
            .field("shards", &self.shards.len())
            .finish_non_exhaustive()
    }
}
