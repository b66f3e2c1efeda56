//! Error types for kvwatch
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::value::ValueKind;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for kvwatch operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("key [{0}] not found")]
    NotFound(String),

    #[error("shard routing failed: {0}")]
    ShardRouting(String),

    #[error("store does not support watches")]
    WatchUnsupported,

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("unsupported value type: {0}")]
    UnsupportedType(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValueKind, found: ValueKind },

    #[error("invalid value: {0}")]
    Parse(String),

    // -------------------------------------------------------------------------
    // I/O and Network Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("server error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// True for the absent-key condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::NotFound(_))
    }
}
