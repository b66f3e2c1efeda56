//! Core store
//!
//! HashMap-based store with a single RwLock for concurrency.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{KvError, Result};
use crate::value::Value;
use crate::watch::{CancelHandle, WatchOp, WatchStream};

use super::KvStore;

/// In-memory map guarded by one reader/writer lock
///
/// ## Concurrency:
/// - `put` / `delete`: exclusive lock
/// - `get`: shared lock, many concurrent readers
/// - No other blocking and no I/O
#[derive(Debug, Default)]
pub struct CoreStore {
    data: RwLock<HashMap<String, Value>>,
}

impl CoreStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }
}

impl KvStore for CoreStore {
    fn put(&self, key: &str, value: Value) -> Result<()> {
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Value> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| KvError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.data.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(KvError::NotFound(key.to_string())),
        }
    }

    /// A bare core store has no subscription registry; wrap it in a
    /// [`WatchStore`](crate::watch::WatchStore) to watch keys.
    fn add_watch(&self, _key: &str, _op: WatchOp) -> Result<(WatchStream, CancelHandle)> {
        Err(KvError::WatchUnsupported)
    }
}
