//! Engine Module
//!
//! Assembles the store stack from a [`Config`] and executes protocol
//! commands against it.
//!
//! ## Stack
//! ```text
//! ShardedStore ── hash(N, key) ──┬── WatchStore ── CoreStore   (shard 0)
//!                                ├── WatchStore ── CoreStore   (shard 1)
//!                                └── ...
//! ```
//!
//! Each shard carries its own watch engine, so a key's mutations and its
//! subscribers share one sequencer and one dispatcher.

use bytes::Bytes;
use tracing::info;

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::protocol::Command;
use crate::store::{CoreStore, KvStore, ShardedStore};
use crate::value::{marshal, unmarshal, Value};
use crate::watch::{CancelHandle, EventKind, WatchOp, WatchStore, WatchStream};

/// Sharded, watchable store
pub type ShardStack = ShardedStore<WatchStore<CoreStore>>;

/// The storage engine behind the server
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// One watch-wrapped core store per shard
    store: ShardStack,
}

impl Engine {
    /// Build the store stack described by `config`
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let watch = config.watch;
        let store = ShardedStore::new(
            config.shard_count,
            || WatchStore::with_config(CoreStore::new(), watch),
            config.hash_strategy.hasher(),
        )?;

        info!(
            shards = config.shard_count,
            hash = %config.hash_strategy,
            watch_buffer = watch.buffer_size,
            overflow = ?watch.overflow,
            "engine opened"
        );

        Ok(Self { config, store })
    }

    /// Execute a request/response command
    ///
    /// Returns the response payload: an encoded envelope for GET, `PONG`
    /// for PING, nothing otherwise. WATCH streams and is handled by the
    /// connection instead.
    pub fn execute(&self, command: Command) -> Result<Option<Bytes>> {
        match command {
            Command::Get { key } => {
                let value = self.get(&key)?;
                Ok(Some(marshal(&value)?.encode()))
            }
            Command::Put { key, value } => {
                self.put(&key, unmarshal(&value)?)?;
                Ok(None)
            }
            Command::Delete { key } => {
                self.delete(&key)?;
                Ok(None)
            }
            Command::Ping => Ok(Some(Bytes::from_static(b"PONG"))),
            Command::Watch { .. } => Err(KvError::Protocol(
                "WATCH needs a streaming connection".to_string(),
            )),
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying sharded store
    pub fn store(&self) -> &ShardStack {
        &self.store
    }

    /// Live listeners for (key, kind) on the key's shard
    pub fn listener_count(&self, key: &str, kind: EventKind) -> Result<usize> {
        Ok(self.watch_shard(key)?.listener_count(key, kind))
    }

    /// Events dropped by the overflow policy across all shards
    pub fn dropped_events(&self) -> u64 {
        (0..self.store.shard_count())
            .filter_map(|i| self.store.shard(i))
            .map(|shard| shard.dropped_events())
            .sum()
    }

    fn watch_shard(&self, key: &str) -> Result<&WatchStore<CoreStore>> {
        let index = self.store.shard_for(key)?;
        self.store
            .shard(index)
            .ok_or_else(|| KvError::ShardRouting(format!("no shard {}", index)))
    }
}

impl KvStore for Engine {
    fn put(&self, key: &str, value: Value) -> Result<()> {
        self.store.put(key, value)
    }

    fn get(&self, key: &str) -> Result<Value> {
        self.store.get(key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key)
    }

    fn add_watch(&self, key: &str, op: WatchOp) -> Result<(WatchStream, CancelHandle)> {
        self.store.add_watch(key, op)
    }
}
