//! Configuration for kvwatch
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::str::FromStr;

use crate::error::{KvError, Result};
use crate::store::{Crc32Hasher, FirstByteHasher, ShardHasher};

/// Main configuration for a kvwatch instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Number of independently locked shards
    pub shard_count: usize,

    /// How keys are mapped to shards
    pub hash_strategy: HashStrategy,

    // -------------------------------------------------------------------------
    // Watch Configuration
    // -------------------------------------------------------------------------
    pub watch: WatchConfig,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// Shard routing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashStrategy {
    /// First byte of the key modulo shard count; rejects empty keys
    FirstByte,

    /// CRC32 of the key modulo shard count
    Crc32,
}

impl HashStrategy {
    pub(crate) fn hasher(self) -> Box<dyn ShardHasher> {
        match self {
            HashStrategy::FirstByte => Box::new(FirstByteHasher),
            HashStrategy::Crc32 => Box::new(Crc32Hasher),
        }
    }
}

impl FromStr for HashStrategy {
    type Err = KvError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "first-byte" => Ok(HashStrategy::FirstByte),
            "crc32" => Ok(HashStrategy::Crc32),
            _ => Err(KvError::Config(format!("unknown hash strategy: {}", name))),
        }
    }
}

impl fmt::Display for HashStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashStrategy::FirstByte => f.write_str("first-byte"),
            HashStrategy::Crc32 => f.write_str("crc32"),
        }
    }
}

/// Watch engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    /// Events buffered per listener before the overflow policy applies
    pub buffer_size: usize,

    /// What to drop when a listener's buffer is full
    pub overflow: OverflowPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            buffer_size: 16,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(KvError::Config(
                "watch buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Overflow policy for a full listener buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest buffered event to make room (consumers see the latest state)
    DropOldest,

    /// Discard the incoming event
    DropNewest,
}

impl FromStr for OverflowPolicy {
    type Err = KvError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "drop-oldest" => Ok(OverflowPolicy::DropOldest),
            "drop-newest" => Ok(OverflowPolicy::DropNewest),
            _ => Err(KvError::Config(format!("unknown overflow policy: {}", name))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: 10,
            hash_strategy: HashStrategy::FirstByte,
            watch: WatchConfig::default(),
            listen_addr: "127.0.0.1:2000".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check values that would make the store unusable
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(KvError::Config(
                "shard_count must be greater than 0".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(KvError::Config(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        self.watch.validate()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of shards
    pub fn shard_count(mut self, count: usize) -> Self {
        self.config.shard_count = count;
        self
    }

    /// Set the shard routing strategy
    pub fn hash_strategy(mut self, strategy: HashStrategy) -> Self {
        self.config.hash_strategy = strategy;
        self
    }

    /// Set the per-listener event buffer size
    pub fn watch_buffer_size(mut self, size: usize) -> Self {
        self.config.watch.buffer_size = size;
        self
    }

    /// Set the overflow policy for full listener buffers
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.watch.overflow = policy;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
