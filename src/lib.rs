//! # kvwatch
//!
//! An in-memory, sharded key-value store with per-key change subscriptions:
//! - Dynamically typed values with a self-describing envelope codec
//! - Pluggable shard hashing (first byte, CRC32)
//! - Watches for puts, deletes or both, delivered in mutation order
//! - TCP-based client protocol with streaming watch connections
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │          (request/response + streaming WATCH)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │                ShardedStore (hash → N)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ WatchStore  │   ...    │ WatchStore  │
//!   │ (sequencer, │          │ (sequencer, │
//!   │ dispatcher) │          │ dispatcher) │
//!   └──────┬──────┘          └──────┬──────┘
//!          ▼                        ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  CoreStore  │          │  CoreStore  │
//!   │  (RwLock)   │          │  (RwLock)   │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod value;
pub mod store;
pub mod watch;
pub mod network;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, HashStrategy, OverflowPolicy, WatchConfig};
pub use engine::Engine;
pub use store::{CoreStore, KvStore, ShardedStore};
pub use value::{marshal, unmarshal, unmarshal_typed, Envelope, Value, ValueKind};
pub use watch::{CancelHandle, EventKind, Update, WatchOp, WatchStore, WatchStream};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvwatch
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
