//! Command definitions
//!
//! Represents commands from clients.

use crate::value::Envelope;
use crate::watch::WatchOp;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Delete = 0x03,
    Ping = 0x04,
    Watch = 0x05,
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Put a key-value pair; the value travels as an envelope
    Put { key: String, value: Envelope },

    /// Delete a key
    Delete { key: String },

    /// Ping (health check)
    Ping,

    /// Subscribe to changes of a key; the connection then streams events
    Watch { key: String, op: WatchOp },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Delete { .. } => CommandType::Delete,
            Command::Ping => CommandType::Ping,
            Command::Watch { .. } => CommandType::Watch,
        }
    }
}
