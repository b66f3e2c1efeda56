//! Response definitions
//!
//! Represents responses to clients.

use crate::error::{KvError, Result};
use crate::value::marshal;
use crate::watch::Update;

use super::codec::encode_event;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    /// One streamed watch event
    Event = 0x03,
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (envelope for GET, event for EVENT, message for ERROR)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response with optional payload
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    /// Create a NOT_FOUND response
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: None,
        }
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Map a failed operation to its response
    pub fn from_error(err: &KvError) -> Self {
        match err {
            KvError::NotFound(_) => Self::not_found(),
            other => Self::error(&other.to_string()),
        }
    }

    /// Create an EVENT response carrying one watch update
    pub fn event(update: &Update) -> Result<Self> {
        let envelope = update.value.as_ref().map(marshal).transpose()?;
        Ok(Self {
            status: Status::Event,
            payload: Some(encode_event(update, envelope.as_ref())),
        })
    }
}
